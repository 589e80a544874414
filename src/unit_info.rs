use crate::pl1000::{PicoInfo, PicoStatus};
use std::fmt;

/// Result of querying a set of PICO_INFO fields, one outcome per field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitInfo {
    fields: Vec<(PicoInfo, Result<String, PicoStatus>)>,
}

impl UnitInfo {
    pub fn insert(&mut self, info: PicoInfo, value: Result<String, PicoStatus>) {
        match self.fields.iter_mut().find(|(i, _)| *i == info) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((info, value)),
        }
    }

    pub fn get(&self, info: PicoInfo) -> Option<&str> {
        self.fields
            .iter()
            .find(|(i, _)| *i == info)
            .and_then(|(_, v)| v.as_deref().ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (PicoInfo, &str)> {
        self.fields
            .iter()
            .filter_map(|(i, v)| v.as_deref().ok().map(|s| (*i, s)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (PicoInfo, PicoStatus)> + '_ {
        self.fields
            .iter()
            .filter_map(|(i, v)| v.as_ref().err().map(|e| (*i, *e)))
    }

    /// Device type string, e.g. "PicoLog1216".
    pub fn variant(&self) -> Option<&str> {
        self.get(PicoInfo::VariantInfo)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for UnitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (info, value) in &self.fields {
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            match value {
                Ok(v) => write!(f, "{}: {}", info.name(), v)?,
                Err(status) => write!(f, "{}: <{}>", info.name(), status)?,
            }
        }
        Ok(())
    }
}
