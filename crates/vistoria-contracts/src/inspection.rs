use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which service tier produced a piece of analysis text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Primary,
    Offline,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Offline => "offline",
        }
    }
}

/// An uploaded vehicle photo. Immutable once captured.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl VehicleImage {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// The free-text result of analyzing one image, tagged with the tier that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub filename: String,
    pub text: String,
    pub tier: Tier,
}

/// The consolidated report text synthesized from all per-image analyses of
/// one inspection. Sole input to Q&A and report rendering. The tier is
/// `None` when the text was recovered from a persisted artifact and its
/// provenance is no longer known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedAnalysis {
    pub text: String,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportLocators {
    pub pdf: Option<String>,
    pub txt: Option<String>,
}

/// Mutable state for one inspection session: the image list, the combined
/// analysis, the chat transcript and the report locators. Created on
/// session start, dropped (or `reset`) on session end; nothing here is
/// shared across sessions.
#[derive(Debug, Default)]
pub struct SessionState {
    pub inspection_id: String,
    pub images: Vec<VehicleImage>,
    pub analyses: Vec<ImageAnalysis>,
    pub combined: Option<CombinedAnalysis>,
    pub chat: Vec<ChatTurn>,
    pub report: ReportLocators,
}

impl SessionState {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(inspection_id: impl Into<String>) -> Self {
        Self {
            inspection_id: inspection_id.into(),
            images: Vec::new(),
            analyses: Vec::new(),
            combined: None,
            chat: Vec::new(),
            report: ReportLocators::default(),
        }
    }

    pub fn add_image(&mut self, filename: impl Into<String>, bytes: Vec<u8>) {
        self.images.push(VehicleImage::new(filename, bytes));
    }

    pub fn combined_text(&self) -> Option<&str> {
        self.combined.as_ref().map(|combined| combined.text.as_str())
    }

    pub fn record_turn(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.chat.push(ChatTurn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// Starts a fresh inspection: new id, all accumulated state cleared.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

pub fn upload_key(inspection_id: &str, filename: &str) -> String {
    format!("uploads/{inspection_id}/{filename}")
}

pub fn report_pdf_key(inspection_id: &str) -> String {
    format!("reports/{inspection_id}/report.pdf")
}

pub fn report_txt_key(inspection_id: &str) -> String {
    format!("reports/{inspection_id}/report.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_namespaced_by_inspection() {
        assert_eq!(upload_key("abc", "front.jpg"), "uploads/abc/front.jpg");
        assert_eq!(report_pdf_key("abc"), "reports/abc/report.pdf");
        assert_eq!(report_txt_key("abc"), "reports/abc/report.txt");
    }

    #[test]
    fn session_starts_empty_with_generated_id() {
        let session = SessionState::new();
        assert!(!session.inspection_id.is_empty());
        assert!(session.images.is_empty());
        assert!(session.combined.is_none());
        assert!(session.chat.is_empty());
        assert_eq!(session.report, ReportLocators::default());
    }

    #[test]
    fn reset_issues_a_new_inspection_id_and_clears_state() {
        let mut session = SessionState::new();
        let first_id = session.inspection_id.clone();
        session.add_image("a.jpg", vec![1, 2, 3]);
        session.combined = Some(CombinedAnalysis {
            text: "laudo".to_string(),
            tier: Some(Tier::Offline),
        });
        session.record_turn("pergunta", "resposta");

        session.reset();
        assert_ne!(session.inspection_id, first_id);
        assert!(session.images.is_empty());
        assert!(session.combined.is_none());
        assert!(session.chat.is_empty());
    }

    #[test]
    fn chat_turns_keep_order() {
        let mut session = SessionState::new();
        session.record_turn("primeira", "um");
        session.record_turn("segunda", "dois");
        assert_eq!(session.chat[0].question, "primeira");
        assert_eq!(session.chat[1].question, "segunda");
    }
}
