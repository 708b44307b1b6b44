pub mod analysis;
pub mod gemini;
pub mod schemas;
pub mod zero_shot;

pub use analysis::{AnalysisOrchestrator, AnalysisProfile};
pub use gemini::{GeminiClient, GenerativeModel};
pub use schemas::{AnalysisResult, AnalysisSource};
pub use zero_shot::{ModelHandle, ZeroShotClassifier};
