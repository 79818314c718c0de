pub mod alerts;
pub mod bundles;
pub mod correlation;
pub mod events;
pub mod health;
pub mod jobs;
pub mod rehydrate;
