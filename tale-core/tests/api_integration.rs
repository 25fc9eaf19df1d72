//! Live API smoke tests.
//!
//! These hit real backends and are ignored by default. Run with:
//! `ANTHROPIC_API_KEY=$ANTHROPIC_API_KEY cargo test -p tale-core --test api_integration -- --ignored --nocapture`

use std::sync::Arc;
use tale_core::{
    validate_response, AnthropicProvider, Choice, FailoverRouter, OpenAiProvider,
    ProviderAdapter, ProviderDescriptor, SessionCoordinator,
};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

fn has_anthropic_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

fn has_openai_key() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok()
}

#[tokio::test]
#[ignore]
async fn test_anthropic_single_beat() {
    setup();
    if !has_anthropic_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let provider = AnthropicProvider::from_env(
        ProviderDescriptor::new("anthropic-live", 1).with_cost_per_token(0.000_003),
    )
    .unwrap();
    let coordinator =
        SessionCoordinator::new(FailoverRouter::new(vec![
            Arc::new(provider) as Arc<dyn ProviderAdapter>
        ]));

    coordinator.start("abandoned-observatory").unwrap();
    let beat = coordinator.choose(Choice::Yes).await.unwrap();

    println!("narrative: {}", beat.narrative);
    assert!(validate_response(&beat.narrative));
    assert_eq!(coordinator.context().unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_failover_to_openai_with_bad_anthropic_key() {
    setup();
    if !has_openai_key() {
        eprintln!("Skipping test: OPENAI_API_KEY not set");
        return;
    }

    // A primary with a bogus key must fail over to the real backup.
    let bad_primary = AnthropicProvider::new(
        tale_backends::anthropic::Client::new("not-a-real-key"),
        ProviderDescriptor::new("anthropic-broken", 1),
    );
    let backup = OpenAiProvider::from_env(ProviderDescriptor::new("openai-live", 2)).unwrap();

    let coordinator = SessionCoordinator::new(FailoverRouter::new(vec![
        Arc::new(bad_primary) as Arc<dyn ProviderAdapter>,
        Arc::new(backup) as Arc<dyn ProviderAdapter>,
    ]));

    coordinator.start("lighthouse-keeper").unwrap();
    let beat = coordinator.choose(Choice::No).await.unwrap();

    println!("narrative via {}: {}", beat.provider_id, beat.narrative);
    assert_eq!(beat.provider_id, "openai-live");
}
