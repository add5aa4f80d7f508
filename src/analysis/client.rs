use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Failure reported by an analyzer. Never surfaced to the user; the meal just
/// keeps its zero nutrients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("no photo to analyze")]
    NoPhoto,
    #[error("analyzer I/O error: {0}")]
    Io(String),
    #[error("analyzer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("analyzer produced invalid output: {0}")]
    InvalidOutput(String),
    #[error("analysis rejected: {0}")]
    Rejected(String),
}

/// Turns a meal photo into a free-form nutrition reply.
///
/// Called once per meal. Implementations decide their own transport; callers
/// apply no timeout and no retry.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, photo: &[u8]) -> Result<String, AnalysisError>;
}

/// Answers every photo with the same reply.
#[derive(Debug, Clone, Default)]
pub struct StubAnalyzer {
    reply: String,
}

impl StubAnalyzer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, photo: &[u8]) -> Result<String, AnalysisError> {
        if photo.is_empty() {
            return Err(AnalysisError::NoPhoto);
        }
        Ok(self.reply.clone())
    }
}

/// Runs an external program with the photo on stdin and takes its stdout as
/// the reply.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze(&self, photo: &[u8]) -> Result<String, AnalysisError> {
        if photo.is_empty() {
            return Err(AnalysisError::NoPhoto);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AnalysisError::Io(format!("failed to start '{}': {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AnalysisError::Io("analyzer stdin unavailable".to_string()))?;

        // Feed stdin while draining stdout so large photos cannot deadlock on
        // a full pipe.
        let feed = async move {
            let written = stdin.write_all(photo).await;
            drop(stdin);
            match written {
                // The program may exit without reading all of its input.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (_, output) = futures::future::try_join(feed, child.wait_with_output())
            .await
            .map_err(|e| AnalysisError::Io(e.to_string()))?;

        if !output.status.success() {
            return Err(AnalysisError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| AnalysisError::InvalidOutput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_analyzer_returns_reply() {
        let analyzer = StubAnalyzer::new("Calories: 400");
        assert_eq!(analyzer.analyze(b"jpeg").await.unwrap(), "Calories: 400");
    }

    #[tokio::test]
    async fn test_stub_analyzer_rejects_empty_photo() {
        let analyzer = StubAnalyzer::new("Calories: 400");
        assert_eq!(analyzer.analyze(&[]).await, Err(AnalysisError::NoPhoto));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_analyzer_reads_stdout() {
        let analyzer = CommandAnalyzer::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; printf 'Calories: 250, Fat: 9'".to_string(),
            ],
        );

        let reply = analyzer.analyze(&[7u8; 256 * 1024]).await.unwrap();
        assert_eq!(reply, "Calories: 250, Fat: 9");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_analyzer_sees_photo_bytes() {
        let analyzer = CommandAnalyzer::new(
            "sh",
            vec!["-c".to_string(), "printf 'Calories: '; wc -c | tr -d ' \\n'".to_string()],
        );

        let reply = analyzer.analyze(b"12345").await.unwrap();
        assert_eq!(reply, "Calories: 5");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_analyzer_nonzero_exit() {
        let analyzer = CommandAnalyzer::new(
            "sh",
            vec!["-c".to_string(), "echo 'model offline' >&2; exit 3".to_string()],
        );

        match analyzer.analyze(b"photo").await {
            Err(AnalysisError::Failed { stderr, .. }) => assert_eq!(stderr, "model offline"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_analyzer_missing_program() {
        let analyzer = CommandAnalyzer::new("mealsnap-no-such-analyzer", Vec::new());
        assert!(matches!(
            analyzer.analyze(b"photo").await,
            Err(AnalysisError::Io(_))
        ));
    }
}
