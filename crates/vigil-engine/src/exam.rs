use url::Url;

/// Exam authority used when none is configured, matching the reference
/// development deployment.
pub const DEFAULT_EXAM_HOST: &str = "localhost:4200";

/// Decides whether a URL belongs to the monitored assessment.
///
/// Drives severity classification in the listeners: staying on an exam host
/// is unremarkable, leaving it is not.
#[derive(Debug, Clone)]
pub struct ExamContext {
    hosts: Vec<String>,
}

impl ExamContext {
    /// `hosts` are `host[:port]` authorities; a URL matching any of them is
    /// exam context.
    pub fn new(hosts: Vec<String>) -> Self {
        Self { hosts }
    }

    pub fn single(host: impl Into<String>) -> Self {
        Self::new(vec![host.into()])
    }

    /// True iff `raw` parses as a URL whose authority matches a configured
    /// exam host. Unparsable input is never exam context.
    pub fn is_exam_url(&self, raw: &str) -> bool {
        let Ok(url) = Url::parse(raw) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        self.hosts.iter().any(|h| h == &authority)
    }
}

impl Default for ExamContext {
    fn default() -> Self {
        Self::single(DEFAULT_EXAM_HOST)
    }
}
