//! Regex classifier for natural-language project commands (English and Spanish).
//!
//! Requests that match one of these intents are answered locally, without a
//! provider round trip.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AnalyzeProject,
    CalculateCompletion,
    DetectArchitecture,
    ListFiles { path: String },
    View { path: String },
    Unknown { message: String },
}

impl Intent {
    pub fn action(&self) -> &'static str {
        match self {
            Intent::AnalyzeProject => "analyze_project",
            Intent::CalculateCompletion => "calculate_completion",
            Intent::DetectArchitecture => "detect_architecture",
            Intent::ListFiles { .. } => "list_files",
            Intent::View { .. } => "view",
            Intent::Unknown { .. } => "unknown",
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Intent::ListFiles { path } | Intent::View { path } => Some(path),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Intent::Unknown { .. })
    }
}

pub struct IntentClassifier {
    analyze: Regex,
    completion: Regex,
    architecture: Regex,
    list_files: Regex,
    list_files_en: Regex,
    view_file: Regex,
}

impl IntentClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            analyze: Regex::new(r"(?i)\b(?:analiza|revisa|analyze|review)\s+(?:el\s+|the\s+)?(?:proyecto|project)\b")?,
            completion: Regex::new(r"(?i)calcula.*completado|calculate.*completion")?,
            architecture: Regex::new(r"(?i)detecta.*arquitectura|detect.*architecture")?,
            list_files: Regex::new(
                r"(?i)(?:lista|ver|mostrar)\s+(?:los|el)?\s*(?:archivos|contenido)\s+(?:de|del|en)?\s*(?:directorio|carpeta)\s+(?P<path>[\w./-]+)",
            )?,
            list_files_en: Regex::new(
                r"(?i)(?:list|show)\s+(?:the\s+)?(?:files|contents)\s+(?:in|of)\s+(?:the\s+)?(?:(?:directory|folder)\s+)?(?P<path>[\w./-]+)",
            )?,
            view_file: Regex::new(r"(?i)(?:ver|mostrar|show|view)\s+(?:el\s+|the\s+)?(?:archivo|file)\s+(?P<path>[\w./-]+)")?,
        })
    }

    pub fn classify(&self, text: &str) -> Intent {
        if self.analyze.is_match(text) {
            return Intent::AnalyzeProject;
        }
        if self.completion.is_match(text) {
            return Intent::CalculateCompletion;
        }
        if self.architecture.is_match(text) {
            return Intent::DetectArchitecture;
        }
        let captured_path = |re: &Regex| {
            re.captures(text)
                .and_then(|caps| caps.name("path").map(|m| m.as_str().trim().to_string()))
        };

        if let Some(path) = captured_path(&self.list_files).or_else(|| captured_path(&self.list_files_en)) {
            return Intent::ListFiles { path };
        }
        if let Some(path) = captured_path(&self.view_file) {
            return Intent::View { path };
        }

        Intent::Unknown {
            message: "Could not interpret the command.".to_string(),
        }
    }
}
