use crate::logger::{Attributes, LoggerDevice};
use crate::pl1000::Pl1000Api;
use crate::registry::SessionRegistry;
use anyhow::Result;
use crossbeam_channel::tick;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Stylize,
    symbols::border,
    text::{Line, Text},
    widgets::{Block, Paragraph, Widget},
    DefaultTerminal, Frame,
};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reconfigure,
    Quit,
}

impl Command {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('s') => Some(Command::Start),
            KeyCode::Char('x') => Some(Command::Stop),
            KeyCode::Char('r') => Some(Command::Reconfigure),
            KeyCode::Char('q') => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Status screen over every device in a registry.
pub struct Monitor<D: Pl1000Api> {
    pub registry: SessionRegistry<D>,
    pub t_begin: Instant,
    pub tick: Duration,
    attrs: Vec<Attributes>,
    exit: bool,
}

impl<D: Pl1000Api> Monitor<D> {
    pub fn new(registry: SessionRegistry<D>, tick: Duration) -> Self {
        Self {
            registry,
            t_begin: Instant::now(),
            tick,
            attrs: Vec::new(),
            exit: false,
        }
    }

    /// Poll, handle keys and redraw on every tick until `q`.
    ///
    /// `on_capture` runs for each finished capture.
    pub fn run<F>(&mut self, terminal: &mut DefaultTerminal, mut on_capture: F) -> Result<()>
    where
        F: FnMut(&mut LoggerDevice<D>),
    {
        let ticker = tick(self.tick);
        self.t_begin = Instant::now();
        while !self.exit {
            let _ = ticker.recv();

            for name in self.registry.poll_once() {
                if let Some(dev) = self.registry.get_mut(&name) {
                    on_capture(dev);
                }
            }

            self.handle_events()?;
            self.attrs = self.registry.iter_mut().map(|d| d.snapshot()).collect();
            terminal.draw(|f| self.draw(f))?;
        }
        for dev in self.registry.iter_mut() {
            if dev.record_in_progress() {
                dev.stop_recording();
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::ZERO)? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    self.handle_key_event(key_event);
                }
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        if let Some(cmd) = Command::from_key(key_event.code) {
            self.apply(cmd);
        }
    }

    pub fn apply(&mut self, cmd: Command) {
        if cmd == Command::Quit {
            self.exit = true;
            return;
        }
        for dev in self.registry.iter_mut() {
            match cmd {
                Command::Start => {
                    dev.start_recording();
                }
                Command::Stop => dev.stop_recording(),
                Command::Reconfigure => {
                    let _ = dev.reconfigure();
                }
                Command::Quit => (),
            }
        }
    }

    pub fn exited(&self) -> bool {
        self.exit
    }
}

fn device_lines(a: &Attributes) -> Vec<Line<'static>> {
    let ping = if a.ping < 0.0 {
        "---".to_string()
    } else {
        format!("{:.2} ms", a.ping * 1e3)
    };
    vec![
        Line::from(vec![
            a.name.clone().bold(),
            " ".into(),
            a.device_type.clone().into(),
            " State: ".into(),
            format!("{:?}", a.state).yellow(),
            " Ping: ".into(),
            ping.yellow(),
            " Status: ".into(),
            a.last_status.clone().yellow(),
        ]),
        Line::from(vec![
            "Channels: ".into(),
            a.channels.clone().yellow(),
            " Points: ".into(),
            a.points_per_channel.to_string().yellow(),
            " Record: ".into(),
            format!("{} us", a.record_us).yellow(),
            " Sampling: ".into(),
            format!("{:.4} ms", a.sampling).yellow(),
        ]),
        Line::from(vec![
            "Recording: ".into(),
            a.record_in_progress.to_string().yellow(),
            " Data ready: ".into(),
            a.data_ready.to_string().yellow(),
            " Captures: ".into(),
            a.captures.to_string().yellow(),
            " Overflow: ".into(),
            format!("{:#06b}", a.overflow).yellow(),
            " Trigger: ".into(),
            a.trigger.to_string().yellow(),
        ]),
        Line::from(a.message.clone().italic()),
        Line::from(""),
    ]
}

impl<D: Pl1000Api> Widget for &Monitor<D> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = Line::from(" PicoLog 1000 Monitor ".bold());
        let instructions = Line::from(vec![
            " Start ".into(),
            "<S>".blue().bold(),
            " Stop ".into(),
            "<X>".blue().bold(),
            " Reconfigure ".into(),
            "<R>".blue().bold(),
            " Quit ".into(),
            "<Q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let mut lines = vec![Line::from(vec![
            "Elapsed time: ".into(),
            self.t_begin.elapsed().as_secs().to_string().yellow(),
            " s".into(),
        ])];
        for a in &self.attrs {
            lines.extend(device_lines(a));
        }

        Paragraph::new(Text::from(lines))
            .block(block)
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Conf;
    use crate::simulator::SimulatedPl1000;
    use confique::Config;

    fn monitor() -> Monitor<SimulatedPl1000> {
        let mut conf = Conf::builder().load().unwrap();
        conf.acquisition.points_per_channel = 100;
        conf.acquisition.record_us = 10_000;
        let mut dev = LoggerDevice::new("pl/test/1", SimulatedPl1000::new(), conf);
        dev.init().unwrap();
        let mut registry = SessionRegistry::new();
        registry.insert(dev);
        Monitor::new(registry, Duration::from_millis(100))
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(Command::from_key(KeyCode::Char('s')), Some(Command::Start));
        assert_eq!(Command::from_key(KeyCode::Char('q')), Some(Command::Quit));
        assert_eq!(Command::from_key(KeyCode::Enter), None);
    }

    #[test]
    fn commands_drive_devices() {
        let mut m = monitor();
        m.registry
            .get_mut("pl/test/1")
            .unwrap()
            .session_mut()
            .device_mut()
            .ready_delay = None;
        m.apply(Command::Start);
        assert!(m.registry.get("pl/test/1").unwrap().record_in_progress());
        m.apply(Command::Stop);
        assert!(!m.registry.get("pl/test/1").unwrap().record_in_progress());
        m.apply(Command::Quit);
        assert!(m.exited());
    }

    #[test]
    fn renders_device_status() {
        let mut m = monitor();
        m.attrs = m.registry.iter_mut().map(|d| d.snapshot()).collect();
        let area = Rect::new(0, 0, 100, 12);
        let mut buf = Buffer::empty(area);
        (&m).render(area, &mut buf);
        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("PicoLog 1000 Monitor"));
        assert!(text.contains("pl/test/1"));
        assert!(text.contains("PicoLog1216"));
    }
}
