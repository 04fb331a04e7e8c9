// ABOUTME: Sends a test query to a deployed agent and collects the streamed events.
// ABOUTME: A silent stream is a soft failure, distinct from a missing deployment.

use enginectl_agent::{DeploymentDirectory, QueryEvent, QueryStream, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// At least one event arrived before the stream closed
    Responsive,
    /// Deployed, but the stream closed without any event
    Silent,
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub resource_name: String,
    pub events: Vec<QueryEvent>,
    pub outcome: VerifyOutcome,
}

impl Verification {
    pub fn is_success(&self) -> bool {
        self.outcome == VerifyOutcome::Responsive
    }

    /// Text of all events joined in arrival order
    pub fn text(&self) -> String {
        self.events.iter().map(|e| e.text()).collect()
    }
}

pub struct Verifier<'a> {
    directory: &'a dyn DeploymentDirectory,
}

impl<'a> Verifier<'a> {
    pub fn new(directory: &'a dyn DeploymentDirectory) -> Self {
        Self { directory }
    }

    /// Resolve the instance and open a query stream against it.
    ///
    /// Fails with NotFound before any stream is opened when the resource does
    /// not exist.
    pub async fn open(
        &self,
        resource_name: &str,
        user_id: &str,
        query: &str,
    ) -> Result<QueryStream> {
        let instance = self.directory.get(resource_name).await?;
        tracing::info!(
            resource_name = %instance.resource_name,
            display_name = %instance.display_name,
            user_id = %user_id,
            "Sending verification query"
        );
        self.directory.stream_query(&instance, user_id, query).await
    }

    pub async fn verify(
        &self,
        resource_name: &str,
        user_id: &str,
        query: &str,
    ) -> Result<Verification> {
        self.verify_with(resource_name, user_id, query, |_| {}).await
    }

    /// Like [`Verifier::verify`], calling `on_event` as each event arrives.
    ///
    /// A mid-stream failure returns the stream error; events already passed
    /// to `on_event` stay delivered.
    pub async fn verify_with<F>(
        &self,
        resource_name: &str,
        user_id: &str,
        query: &str,
        mut on_event: F,
    ) -> Result<Verification>
    where
        F: FnMut(&QueryEvent),
    {
        let mut stream = self.open(resource_name, user_id, query).await?;
        let mut events = Vec::new();

        while let Some(item) = stream.recv().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        resource_name = %resource_name,
                        received = events.len(),
                        error = %e,
                        "Verification stream failed"
                    );
                    return Err(e);
                }
            };
            on_event(&event);
            events.push(event);
        }

        let outcome = if events.is_empty() {
            tracing::warn!(resource_name = %resource_name, "Agent returned no events");
            VerifyOutcome::Silent
        } else {
            VerifyOutcome::Responsive
        };

        Ok(Verification {
            resource_name: resource_name.to_string(),
            events,
            outcome,
        })
    }
}
