//! Interactive single-character command menu.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, Lines};
use tracing::{error, info};

use dm856_driver::{Delay, DeviceDriver, DriverError, RegisterIo};

use super::chart;

const CHART_WIDTH: usize = 100;
const CHART_HEIGHT: usize = 20;

/// What a command key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Set,
    Persist,
    CurrentLoop,
    Resonance,
    Quit,
    Help,
}

/// One row of the command table.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    pub key: char,
    pub action: Action,
    pub help: &'static str,
}

/// Command keys, in prompt order.
pub const COMMANDS: &[Command] = &[
    Command {
        key: 'l',
        action: Action::List,
        help: "list current parameters value",
    },
    Command {
        key: 's',
        action: Action::Set,
        help: "choose a parameter to set",
    },
    Command {
        key: 'x',
        action: Action::Persist,
        help: "write current parameters to EEPROM",
    },
    Command {
        key: 'c',
        action: Action::CurrentLoop,
        help: "run current loop test",
    },
    Command {
        key: 'r',
        action: Action::Resonance,
        help: "run resonance test",
    },
    Command {
        key: 'q',
        action: Action::Quit,
        help: "quit",
    },
    Command {
        key: '?',
        action: Action::Help,
        help: "help",
    },
];

/// Map a line of input to its action. Only a single key is accepted.
pub fn lookup(input: &str) -> Option<Action> {
    let mut chars = input.trim().chars();
    let key = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    COMMANDS.iter().find(|c| c.key == key).map(|c| c.action)
}

pub fn prompt() -> String {
    let keys: Vec<String> = COMMANDS.iter().map(|c| c.key.to_string()).collect();
    format!("Command [{}]? (type ? for help)", keys.join(","))
}

pub fn help() -> String {
    let mut text = String::from("-----------------\n");
    for command in COMMANDS {
        text.push_str(&format!("{} : {}\n", command.key, command.help));
    }
    text.push_str("-----------------");
    text
}

/// Menu loop over a driver, reading commands from `input`.
pub struct Menu<L, D, R, W> {
    driver: DeviceDriver<L, D>,
    input: Lines<R>,
    output: W,
}

impl<L, D, R, W> Menu<L, D, R, W>
where
    L: RegisterIo,
    D: Delay,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(driver: DeviceDriver<L, D>, input: Lines<R>, output: W) -> Self {
        Self {
            driver,
            input,
            output,
        }
    }

    /// Run until `q` or end of input. Driver errors are reported and the
    /// loop keeps going.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "{}", prompt())?;

            let Some(line) = self.input.next_line().await? else {
                info!("End of input");
                break;
            };

            match lookup(&line) {
                Some(Action::Quit) => break,
                Some(action) => {
                    if let Err(e) = self.dispatch(action).await {
                        self.report(&e)?;
                    }
                }
                None => writeln!(self.output, "unknown option")?,
            }
        }
        Ok(())
    }

    pub fn into_driver(self) -> DeviceDriver<L, D> {
        self.driver
    }

    async fn dispatch(&mut self, action: Action) -> std::result::Result<(), DriverError> {
        match action {
            Action::List => {
                for row in self.driver.list_param().await? {
                    self.say(&row.to_string());
                }
            }
            Action::Set => self.set_param().await?,
            Action::Persist => {
                self.driver.persist().await?;
                self.say("Parameters written to EEPROM.");
            }
            Action::CurrentLoop => {
                let samples = self.driver.current_loop_test().await?;
                let rendered = chart::render(&samples, CHART_WIDTH, CHART_HEIGHT);
                self.say(rendered.trim_end());
            }
            Action::Resonance => {
                self.say("Resonance test running...");
                self.driver.resonance_test().await?;
                self.say("Resonance test done.");
            }
            Action::Help => self.say(&help()),
            Action::Quit => {}
        }
        Ok(())
    }

    async fn set_param(&mut self) -> std::result::Result<(), DriverError> {
        self.say("Choose parameter index:");
        let Some(answer) = self.ask().await else {
            return Ok(());
        };

        let map = *self.driver.parameters();
        let index = match answer.parse::<usize>() {
            Ok(index) => Some(index),
            Err(_) => map.find(&answer),
        };
        let Some((index, parameter)) = index.and_then(|i| map.get(i).ok().map(|p| (i, p))) else {
            self.say("This parameter does not exist.");
            return Ok(());
        };

        self.say(&format!("Choose a value for {}:", parameter.name));
        let Some(answer) = self.ask().await else {
            return Ok(());
        };
        let Ok(value) = answer.parse::<u16>() else {
            self.say("Value must be an integer between 0 and 65535.");
            return Ok(());
        };

        self.driver.set_param(index, value).await
    }

    /// Read one trimmed answer; `None` on end of input or read error.
    async fn ask(&mut self) -> Option<String> {
        match self.input.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                error!("Failed to read input: {}", e);
                None
            }
        }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = writeln!(self.output, "{}", text) {
            error!("Failed to write output: {}", e);
        }
    }

    fn report(&mut self, err: &DriverError) -> Result<()> {
        if err.leaves_device_active() {
            error!("{}", err);
            writeln!(
                self.output,
                "ERROR: {err}\nWARNING: the driver may still be armed or running; power-cycle it."
            )?;
        } else {
            error!("Command failed: {}", err);
            writeln!(self.output, "Error: {err}")?;
        }
        Ok(())
    }
}
