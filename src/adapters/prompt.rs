//! Interactive capabilities injected into the batch.
//!
//! Certificate selection and per-file confirmation are traits so the batch
//! logic runs unchanged against scripted answers in tests.

use crate::domain::certificate::Certificate;
use crate::domain::types::SigningTarget;
use std::io::{self, BufRead, Cursor, Write};

const MAX_ATTEMPTS: usize = 3;

/// Picks one certificate when the store offers several
pub trait CertificateChooser {
    /// Index into `candidates`, or `None` when the user cancels
    fn choose(&mut self, candidates: &[Certificate]) -> Option<usize>;
}

/// Per-file opt-out before anything is launched
pub trait ConfirmGate {
    /// `true` to sign `target`, `false` to skip it
    fn confirm(&mut self, target: &SigningTarget) -> bool;
}

/// Sign everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSign;

impl ConfirmGate for AlwaysSign {
    fn confirm(&mut self, _target: &SigningTarget) -> bool {
        true
    }
}

/// Decline every file, logging what would have been signed
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

impl ConfirmGate for DryRun {
    fn confirm(&mut self, target: &SigningTarget) -> bool {
        log::info!("What if: signing {target}");
        false
    }
}

/// Line-at-a-time input for prompts
pub trait LineInput {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

/// Every handle reads through the one process-wide stdin buffer, so lines
/// typed ahead for a later prompt are not lost between prompts
impl LineInput for io::Stdin {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        io::Stdin::read_line(self, buf)
    }
}

impl<T: AsRef<[u8]>> LineInput for Cursor<T> {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

impl<L: LineInput + ?Sized> LineInput for &mut L {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        (**self).read_line(buf)
    }
}

/// Numbered list on a terminal
pub struct TerminalChooser<R, W> {
    input: R,
    output: W,
    interactive: bool,
}

impl TerminalChooser<io::Stdin, io::Stderr> {
    /// Prompt on stderr, read stdin
    pub fn stdio() -> Self {
        Self {
            input: io::stdin(),
            output: io::stderr(),
            interactive: atty::is(atty::Stream::Stdin),
        }
    }
}

impl<R: LineInput, W: Write> TerminalChooser<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            interactive: true,
        }
    }

    fn prompt(&mut self, candidates: &[Certificate]) -> io::Result<Option<usize>> {
        writeln!(self.output, "Multiple code signing certificates are available:")?;
        for (i, cert) in candidates.iter().enumerate() {
            writeln!(self.output, "  [{}] {cert}", i + 1)?;
        }

        for _ in 0..MAX_ATTEMPTS {
            write!(
                self.output,
                "Select a certificate (1-{}, empty to cancel): ",
                candidates.len()
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }

            let answer = line.trim();
            if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
                return Ok(None);
            }

            match answer.parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => writeln!(self.output, "Invalid selection: {answer}")?,
            }
        }

        Ok(None)
    }
}

impl<R: LineInput, W: Write> CertificateChooser for TerminalChooser<R, W> {
    fn choose(&mut self, candidates: &[Certificate]) -> Option<usize> {
        if !self.interactive {
            log::warn!(
                "{} certificates match and no terminal is attached; pass --thumbprint to pick one",
                candidates.len()
            );
            return None;
        }

        match self.prompt(candidates) {
            Ok(choice) => choice,
            Err(e) => {
                log::warn!("Certificate prompt failed: {e}");
                None
            }
        }
    }
}

/// Answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Yes,
    No,
    YesToAll,
    NoToAll,
}

impl ConfirmChoice {
    /// Parse a typed answer; empty input means yes
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "" | "y" | "yes" => Some(ConfirmChoice::Yes),
            "n" | "no" => Some(ConfirmChoice::No),
            "a" | "all" => Some(ConfirmChoice::YesToAll),
            "l" | "none" => Some(ConfirmChoice::NoToAll),
            _ => None,
        }
    }
}

/// Asks before each file; "to all" answers stick for the rest of the batch
pub struct PromptGate<R, W> {
    input: R,
    output: W,
    sticky: Option<bool>,
}

impl PromptGate<io::Stdin, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stderr())
    }
}

impl<R: LineInput, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            sticky: None,
        }
    }

    fn ask(&mut self, target: &SigningTarget) -> io::Result<ConfirmChoice> {
        for _ in 0..MAX_ATTEMPTS {
            write!(
                self.output,
                "Sign {target}? [Y] Yes  [A] Yes to All  [N] No  [L] No to All (default is \"Y\"): "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                // Closed input never signs
                return Ok(ConfirmChoice::NoToAll);
            }

            if let Some(choice) = ConfirmChoice::parse(&line) {
                return Ok(choice);
            }
            writeln!(self.output, "Invalid answer: {}", line.trim())?;
        }
        Ok(ConfirmChoice::No)
    }
}

impl<R: LineInput, W: Write> ConfirmGate for PromptGate<R, W> {
    fn confirm(&mut self, target: &SigningTarget) -> bool {
        if let Some(answer) = self.sticky {
            return answer;
        }

        let choice = self.ask(target).unwrap_or_else(|e| {
            log::warn!("Confirmation prompt failed: {e}");
            ConfirmChoice::No
        });

        match choice {
            ConfirmChoice::Yes => true,
            ConfirmChoice::No => false,
            ConfirmChoice::YesToAll => {
                self.sticky = Some(true);
                true
            }
            ConfirmChoice::NoToAll => {
                self.sticky = Some(false);
                false
            }
        }
    }
}
