// ABOUTME: Deployment directory backends (Vertex AI, mock).
// ABOUTME: Each backend implements the DeploymentDirectory trait.

pub mod mock;
pub mod vertex;
