//! Operator disambiguation between several attached devices.

use std::io::Write;
use std::time::Duration;

use acrd_core::device::CandidateDevice;
use acrd_core::error::QuarryError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{info, warn};

/// Chooses one of several candidates.
///
/// Like [`ErrorAdvisor`](crate::advisor::ErrorAdvisor), `pick` yields a
/// future that is not `Send` and must be awaited in place.
pub trait Picker {
    /// Zero-based index into `candidates`.
    async fn pick(&mut self, candidates: &[CandidateDevice]) -> Result<usize, QuarryError>;
}

/// Parse a 1-based menu answer into a zero-based index.
///
/// Anything but a number in `1..=count` is rejected; the input is never
/// clamped or coerced.
pub fn parse_selection(input: &str, count: usize) -> Result<usize, QuarryError> {
    let answer = input.trim();
    match answer.parse::<usize>() {
        Ok(choice) if (1..=count).contains(&choice) => Ok(choice - 1),
        _ => Err(QuarryError::InvalidSelection {
            input: answer.to_string(),
            count,
        }),
    }
}

/// Pick one of `candidates`: the one matching `serial` when given, the only
/// one when there is one, otherwise whatever the operator picks.
pub async fn choose<P: Picker>(
    picker: &mut P,
    mut candidates: Vec<CandidateDevice>,
    serial: Option<&str>,
) -> Result<CandidateDevice, QuarryError> {
    if let Some(serial) = serial {
        return candidates
            .into_iter()
            .find(|candidate| candidate.serial == serial)
            .ok_or_else(|| QuarryError::UnknownSerial(serial.to_string()));
    }

    match candidates.len() {
        0 => Err(QuarryError::NoDeviceFound),
        1 => {
            let candidate = candidates.remove(0);
            info!("Using {} ({})", candidate.serial, candidate.mode);
            Ok(candidate)
        }
        count => {
            let index = picker.pick(&candidates).await?;
            candidates
                .into_iter()
                .nth(index)
                .ok_or_else(|| QuarryError::InvalidSelection {
                    input: (index + 1).to_string(),
                    count,
                })
        }
    }
}

/// Numbered menu written to `out`, answered by one line from `reader`.
pub struct LinePicker<R, W> {
    reader: R,
    out: W,
    timeout: Option<Duration>,
}

impl<R, W> LinePicker<R, W> {
    pub fn new(reader: R, out: W, timeout: Option<Duration>) -> Self {
        Self {
            reader,
            out,
            timeout,
        }
    }
}

impl LinePicker<BufReader<Stdin>, std::io::Stderr> {
    /// Menu on stderr, answer from stdin. Stdout stays clean for `--json`.
    pub fn stdio(timeout: Option<Duration>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stderr(), timeout)
    }
}

impl<R: AsyncBufRead + Unpin, W: Write> LinePicker<R, W> {
    fn render(&mut self, candidates: &[CandidateDevice]) -> std::io::Result<()> {
        writeln!(self.out, "Multiple devices detected:")?;
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(self.out, "  {}. {} ({})", index + 1, candidate.serial, candidate.mode)?;
        }
        write!(self.out, "Select device [1-{}]: ", candidates.len())?;
        self.out.flush()
    }
}

impl<R: AsyncBufRead + Unpin, W: Write> Picker for LinePicker<R, W> {
    async fn pick(&mut self, candidates: &[CandidateDevice]) -> Result<usize, QuarryError> {
        let count = candidates.len();
        if let Err(e) = self.render(candidates) {
            warn!("Failed to write device menu: {}", e);
        }

        let mut line = String::new();
        let read = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.reader.read_line(&mut line))
                .await
                .map_err(|_| QuarryError::SelectionTimeout(limit))?,
            None => self.reader.read_line(&mut line).await,
        };

        match read {
            Ok(0) => Err(QuarryError::InvalidSelection {
                input: String::new(),
                count,
            }),
            Ok(_) => parse_selection(&line, count),
            Err(e) => {
                warn!("Failed to read device selection: {}", e);
                Err(QuarryError::InvalidSelection {
                    input: String::new(),
                    count,
                })
            }
        }
    }
}
