//! Terminal prompt for images that several builders could produce.

use pipegen_core::{BuilderArtifact, InitError};
use pipegen_pipeline::{Choice, Interaction};
use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};
use std::path::{Path, PathBuf};

const MAX_ATTEMPTS: usize = 3;

/// Asks on `output` and reads answers from `input`, one line per question.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    root: PathBuf,
}

impl TerminalPrompt<BufReader<Stdin>, Stderr> {
    pub fn stdio(root: impl Into<PathBuf>) -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr(), root)
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W, root: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output,
            root: root.into(),
        }
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn ask(&mut self, image: &str, candidates: &[&BuilderArtifact]) -> io::Result<()> {
        let lines: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("  {}) {} ({})", i + 1, self.display(&c.path), c.kind.name()))
            .collect();

        writeln!(self.output, "\nSeveral builders can produce {}:", image)?;
        for line in lines {
            writeln!(self.output, "{}", line)?;
        }
        writeln!(self.output, "  s) none of these")?;
        write!(self.output, "Choose [1-{}/s]: ", candidates.len())?;
        self.output.flush()
    }
}

fn parse_answer(answer: &str, candidates: usize) -> Option<Choice> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("s") {
        return Some(Choice::Skip);
    }
    match answer.parse::<usize>() {
        Ok(n) if (1..=candidates).contains(&n) => Some(Choice::Builder(n - 1)),
        _ => None,
    }
}

impl<R: BufRead + Send, W: Write + Send> Interaction for TerminalPrompt<R, W> {
    fn is_available(&self) -> bool {
        true
    }

    fn choose(
        &mut self,
        image: &str,
        candidates: &[&BuilderArtifact],
    ) -> Result<Choice, InitError> {
        let unresolved = || InitError::AmbiguityUnresolved {
            image: image.to_string(),
        };

        for _ in 0..MAX_ATTEMPTS {
            self.ask(image, candidates)
                .map_err(|e| InitError::io("<stderr>", e))?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .map_err(|e| InitError::io("<stdin>", e))?;
            if read == 0 {
                return Err(unresolved());
            }
            if let Some(choice) = parse_answer(&line, candidates.len()) {
                return Ok(choice);
            }
            let _ = writeln!(self.output, "Invalid choice: {}", line.trim());
        }
        Err(unresolved())
    }
}
