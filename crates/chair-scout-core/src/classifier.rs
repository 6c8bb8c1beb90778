use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::trace;

use crate::error::ClassificationError;

/// Scores one image: the probability in [0, 1] that it shows the target chair.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<f64, ClassificationError>;
}

impl<F> Classifier for F
where
    F: Fn(&[u8]) -> Result<f64, ClassificationError> + Send + Sync,
{
    fn classify(&self, image: &[u8]) -> Result<f64, ClassificationError> {
        self(image)
    }
}

/// Reject NaN and anything outside [0, 1].
pub fn checked_probability(value: f64) -> Result<f64, ClassificationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ClassificationError::OutOfRange(value))
    }
}

/// Runs an external scoring program once per image.
///
/// The program is invoked as `<program> <model_path>`, receives the raw image
/// bytes on stdin and must print a single probability on stdout.
pub struct CommandClassifier {
    program: String,
    model_path: String,
}

impl CommandClassifier {
    pub fn new(program: &str, model_path: &str) -> Self {
        Self {
            program: program.to_string(),
            model_path: model_path.to_string(),
        }
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, image: &[u8]) -> Result<f64, ClassificationError> {
        let mut child = Command::new(&self.program)
            .arg(&self.model_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();

        // Feed stdin while stdout and stderr drain, so neither side blocks on
        // a full pipe.
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(image),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output?;

        match written {
            // A scorer that exits early closes its stdin; its exit status says why.
            Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e.into()),
            Err(_) => {
                return Err(ClassificationError::Model(
                    "stdin writer thread panicked".to_string(),
                ))
            }
            _ => {}
        }
        if !output.status.success() {
            return Err(ClassificationError::Model(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value: f64 = stdout.trim().parse().map_err(|_| {
            ClassificationError::Model(format!("unparsable classifier output {:?}", stdout.trim()))
        })?;
        trace!("{} scored image at {}", self.program, value);
        checked_probability(value)
    }
}
