pub mod attempts;
pub mod core;
pub mod courses;
pub mod grades;
pub mod quizzes;
pub mod scores;
pub mod settings;
pub mod transcript;
pub mod weights;
