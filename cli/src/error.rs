/// Terminating error reported to the user in a unified format
#[derive(Debug)]
pub struct Error {
    message: String,

    /// Shown dimmed under the message, as sort of a hint
    hint: Option<String>,
}

impl Error {
    pub fn new(message: &str, hint: Option<&str>) -> Self {
        Error {
            message: message.to_string(),
            hint: hint.map(|h| h.to_string()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(hint) = &self.hint {
            write!(f, "\n\n{}", console::style(hint).dim())?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// Automatically convert all eyre error reports
impl From<eyre::ErrReport> for Error {
    fn from(report: eyre::ErrReport) -> Self {
        let error = report
            .downcast::<Error>()
            .unwrap_or_else(|err| Error::new(&format!("{err:#}"), None));

        eprintln!("\n{}\n{error}", console::style("Error").red().bold());

        // Reaching this conversion always terminates the process
        std::process::exit(1)
    }
}
