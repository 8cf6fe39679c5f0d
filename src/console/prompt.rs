use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::validation::{Validated, ValidationError};

/// Line-oriented prompts over any reader/writer pair.
///
/// End of input surfaces as `io::ErrorKind::UnexpectedEof` so the menu loop can
/// stop cleanly.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn say(&mut self, line: impl Display) -> io::Result<()> {
        writeln!(self.output, "{line}")
    }

    /// Prints `label`, then returns the next line without its newline.
    pub fn read_line(&mut self, label: &str) -> io::Result<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Re-prompts until the line parses and passes `check`.
    pub fn read_number<T>(
        &mut self,
        label: &str,
        check: impl Fn(T) -> Validated,
    ) -> io::Result<T>
    where
        T: FromStr + Copy,
    {
        loop {
            let raw = self.read_line(label)?;
            match raw.trim().parse::<T>() {
                Ok(v) => match check(v) {
                    Ok(()) => return Ok(v),
                    Err(e) => self.say(format_args!("Invalid {e}"))?,
                },
                Err(_) => self.say("Please enter a number.")?,
            }
        }
    }

    /// Re-prompts until `parse` accepts the line.
    pub fn read_validated<T>(
        &mut self,
        label: &str,
        parse: impl Fn(&str) -> Result<T, ValidationError>,
    ) -> io::Result<T> {
        loop {
            let raw = self.read_line(label)?;
            match parse(&raw) {
                Ok(v) => return Ok(v),
                Err(e) => self.say(format_args!("Invalid {e}"))?,
            }
        }
    }

    /// Reads a menu choice in `1..=max`.
    pub fn read_choice(&mut self, max: u32) -> io::Result<u32> {
        loop {
            let raw = self.read_line("Choose an option")?;
            match raw.trim().parse::<u32>() {
                Ok(n) if (1..=max).contains(&n) => return Ok(n),
                _ => self.say(format_args!("Please enter a number between 1 and {max}."))?,
            }
        }
    }

    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let raw = self.read_line(&format!("{question} [y/N]"))?;
        Ok(matches!(raw.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    /// Lists `items` numbered from 1 and returns the picked index, or `None` when
    /// the list is empty or the operator enters 0.
    pub fn pick<T>(
        &mut self,
        items: &[T],
        describe: impl Fn(&T) -> String,
    ) -> io::Result<Option<usize>> {
        if items.is_empty() {
            self.say("Nothing to choose from.")?;
            return Ok(None);
        }
        for (i, item) in items.iter().enumerate() {
            self.say(format_args!("{}. {}", i + 1, describe(item)))?;
        }
        let len = items.len();
        loop {
            let raw = self.read_line("Number (0 to cancel)")?;
            match raw.trim().parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(n) if n <= len => return Ok(Some(n - 1)),
                _ => self.say(format_args!("Please enter a number between 0 and {len}."))?,
            }
        }
    }

    /// Comma-separated picks from `items`; a blank line picks nothing.
    pub fn pick_many<T>(
        &mut self,
        items: &[T],
        describe: impl Fn(&T) -> String,
    ) -> io::Result<Vec<usize>> {
        for (i, item) in items.iter().enumerate() {
            self.say(format_args!("{}. {}", i + 1, describe(item)))?;
        }
        loop {
            let raw = self.read_line("Numbers separated by commas (blank for none)")?;
            let picked: Result<Vec<usize>, ()> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| match s.parse::<usize>() {
                    Ok(n) if (1..=items.len()).contains(&n) => Ok(n - 1),
                    _ => Err(()),
                })
                .collect();
            match picked {
                Ok(v) => return Ok(v),
                Err(()) => self.say(format_args!(
                    "Please enter numbers between 1 and {}.",
                    items.len()
                ))?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{validate_age, validate_email};

    fn prompter(input: &str) -> Prompter<&[u8], Vec<u8>> {
        Prompter::new(input.as_bytes(), Vec::new())
    }

    fn printed(p: &Prompter<&[u8], Vec<u8>>) -> String {
        String::from_utf8_lossy(p.output()).into_owned()
    }

    #[test]
    fn read_line_strips_newline() {
        let mut p = prompter("hello\r\n");
        assert_eq!(p.read_line("Name").unwrap(), "hello");
        assert_eq!(printed(&p), "Name: ");
    }

    #[test]
    fn numbers_reprompt_on_parse_and_validation_failures() {
        let mut p = prompter("abc\n12\n30\n");
        assert_eq!(p.read_number("Age", validate_age).unwrap(), 30);
        let out = printed(&p);
        assert!(out.contains("Please enter a number."));
        assert!(out.contains("Invalid age"));
    }

    #[test]
    fn validated_text_reprompts() {
        let mut p = prompter("not-an-email\njohn@example.com\n");
        let email = p
            .read_validated("Email", |s| validate_email(s).map(|()| s.to_string()))
            .unwrap();
        assert_eq!(email, "john@example.com");
        assert!(printed(&p).contains("Invalid email"));
    }

    #[test]
    fn eof_is_unexpected_eof() {
        let mut p = prompter("");
        let err = p.read_line("Name").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn choice_must_be_in_range() {
        let mut p = prompter("0\n7\n2\n");
        assert_eq!(p.read_choice(6).unwrap(), 2);
        assert!(printed(&p).contains("between 1 and 6"));
    }

    #[test]
    fn pick_and_pick_many() {
        let items = ["Egg", "Toast", "Jam"];
        let mut p = prompter("5\n2\n1, 3\n");
        assert_eq!(p.pick(&items, |s| s.to_string()).unwrap(), Some(1));
        assert_eq!(p.pick_many(&items, |s| s.to_string()).unwrap(), vec![0, 2]);

        let mut p = prompter("0\n\n");
        assert_eq!(p.pick(&items, |s| s.to_string()).unwrap(), None);
        assert!(p.pick_many(&items, |s| s.to_string()).unwrap().is_empty());

        let empty: [&str; 0] = [];
        let mut p = prompter("");
        assert_eq!(p.pick(&empty, |s| s.to_string()).unwrap(), None);
    }

    #[test]
    fn confirm_defaults_to_no() {
        assert!(prompter("y\n").confirm("Sure?").unwrap());
        assert!(!prompter("\n").confirm("Sure?").unwrap());
    }
}
