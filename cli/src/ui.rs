// Copyright 2024 The extdiff Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cell::RefCell;
use std::io;
use std::io::BufRead;
use std::io::IsTerminal as _;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::Mutex;

/// Terminal streams of one command invocation.
pub struct Ui {
    input: Box<dyn BufRead>,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
    can_prompt: bool,
}

/// [`Ui`] shared between the command and the comparators it creates.
pub type SharedUi = Rc<RefCell<Ui>>;

impl Ui {
    /// Uses the process's standard streams. Prompting is enabled only if
    /// both stdin and stderr are terminals.
    pub fn with_stdio() -> Self {
        let can_prompt = io::stdin().is_terminal() && io::stderr().is_terminal();
        Self {
            input: Box::new(io::stdin().lock()),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
            can_prompt,
        }
    }

    pub fn with_streams(
        input: Box<dyn BufRead>,
        stdout: Box<dyn Write>,
        stderr: Box<dyn Write>,
        can_prompt: bool,
    ) -> Self {
        Self {
            input,
            stdout,
            stderr,
            can_prompt,
        }
    }

    pub fn into_shared(self) -> SharedUi {
        Rc::new(RefCell::new(self))
    }

    pub fn stdout(&mut self) -> &mut dyn Write {
        &mut self.stdout
    }

    /// Stream for status messages, errors and prompts.
    pub fn stderr(&mut self) -> &mut dyn Write {
        &mut self.stderr
    }

    pub fn can_prompt(&self) -> bool {
        self.can_prompt
    }

    /// Writes `message` as a line of status output.
    pub fn status(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.stderr, "{message}")
    }

    /// Asks for a line of input, without the trailing newline.
    pub fn prompt(&mut self, prompt: &str) -> io::Result<String> {
        if !self.can_prompt {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "Cannot prompt for input since the output is not connected to a terminal",
            ));
        }
        write!(self.stderr, "{prompt}: ")?;
        self.stderr.flush()?;
        let mut buf = String::new();
        self.input.read_line(&mut buf)?;

        if buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Prompt canceled by EOF",
            ));
        }

        if let Some(trimmed) = buf.strip_suffix('\n') {
            buf.truncate(trimmed.len());
        }
        Ok(buf)
    }

    /// Repeats `prompt` until the answer is yes or no. An empty answer, or
    /// any answer when prompting is not possible, picks `default` if given.
    pub fn prompt_yes_no(&mut self, prompt: &str, default: Option<bool>) -> io::Result<bool> {
        let default_str = match &default {
            Some(true) => "(Yn)",
            Some(false) => "(yN)",
            None => "(yn)",
        };
        let prompt = format!("{prompt} {default_str}");
        if !self.can_prompt
            && let Some(value) = default
        {
            // Choose the default automatically without waiting.
            writeln!(self.stderr, "{prompt}: {}", if value { "y" } else { "n" })?;
            return Ok(value);
        }

        loop {
            let input = self.prompt(&prompt)?;
            let input = input.trim();
            if input.is_empty()
                && let Some(value) = default
            {
                return Ok(value);
            }
            if input.eq_ignore_ascii_case("y") || input.eq_ignore_ascii_case("yes") {
                return Ok(true);
            } else if input.eq_ignore_ascii_case("n") || input.eq_ignore_ascii_case("no") {
                return Ok(false);
            }
            writeln!(self.stderr, "unrecognized response")?;
        }
    }
}

/// In-memory sink whose contents can be read back while a [`Ui`] writes to
/// it.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let data = self.data.lock().unwrap_or_else(|err| err.into_inner());
        String::from_utf8_lossy(&data).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.data.lock().unwrap_or_else(|err| err.into_inner());
        data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl Ui {
    /// Creates a prompting [`Ui`] reading `input`, with stdout and stderr
    /// merged into the returned buffer.
    pub(crate) fn for_test(input: &str) -> (Self, SharedBuffer) {
        let output = SharedBuffer::default();
        let ui = Self::with_streams(
            Box::new(io::Cursor::new(input.as_bytes().to_vec())),
            Box::new(output.clone()),
            Box::new(output.clone()),
            true,
        );
        (ui, output)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use test_case::test_case;

    use super::*;

    #[test_case("y\n", Some(false), true; "yes")]
    #[test_case("No\n", Some(true), false; "no mixed case")]
    #[test_case("\n", Some(true), true; "empty picks default")]
    #[test_case("maybe\nyes\n", None, true; "repeats until recognized")]
    fn test_prompt_yes_no(input: &str, default: Option<bool>, expected: bool) {
        let (mut ui, _) = Ui::for_test(input);
        assert_eq!(ui.prompt_yes_no("Continue?", default).unwrap(), expected);
    }

    #[test]
    fn test_prompt_output() {
        let (mut ui, output) = Ui::for_test("maybe\nn\n");
        assert!(!ui.prompt_yes_no("Continue?", Some(true)).unwrap());
        assert_eq!(
            output.contents(),
            "Continue? (Yn): unrecognized response\nContinue? (Yn): "
        );
    }

    #[test]
    fn test_prompt_eof() {
        let (mut ui, _) = Ui::for_test("");
        assert_matches!(
            ui.prompt_yes_no("Continue?", None),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_cannot_prompt() {
        let output = SharedBuffer::default();
        let mut ui = Ui::with_streams(
            Box::new(io::empty()),
            Box::new(io::sink()),
            Box::new(output.clone()),
            false,
        );
        assert!(ui.prompt_yes_no("Continue?", Some(true)).unwrap());
        assert_eq!(output.contents(), "Continue? (Yn): y\n");
        assert_matches!(
            ui.prompt_yes_no("Continue?", None),
            Err(err) if err.kind() == io::ErrorKind::Unsupported
        );
    }
}
