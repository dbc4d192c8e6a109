pub mod user;
pub mod cycle;
pub mod symptom;
pub mod chat;
pub mod content;
pub mod favorite;

pub use user::{NewUser, ProfileUpdate, User};
pub use cycle::Cycle;
pub use symptom::{NewSymptom, Symptom};
pub use chat::{ChatMessage, ChatRole};
pub use content::{EducationalContent, MeditationVideo, Recipe};
pub use favorite::{Favorite, FavoriteKind};
