use std::sync::Arc;

use agentmarket_core::config::Deployment;
use agentmarket_core::digest::ContentDigest;
use agentmarket_core::flows::Marketplace;
use agentmarket_core::model::{
    AgentDraft, AgentMetadata, FeedbackContent, ValidationRequestContent,
    ValidationResponseContent, ValidationStatus,
};
use agentmarket_core::read_model::ValidationFilter;
use agentmarket_core::sandbox::SandboxNetwork;
use agentmarket_core::signer::StaticSigner;
use agentmarket_core::uri;

const OWNER: &str = "0x00000000000000000000000000000000000000000000000000000000000000a1";
const CLIENT: &str = "0x00000000000000000000000000000000000000000000000000000000000000c1";
const VALIDATOR: &str = "0x00000000000000000000000000000000000000000000000000000000000000d1";

fn setup(page_size: usize) -> (Arc<SandboxNetwork>, Marketplace) {
    let mut deployment = Deployment::sandbox();
    deployment.page_size = page_size;
    let net = Arc::new(SandboxNetwork::new(deployment.clone()));
    let market = Marketplace::new(deployment, net.clone(), net.clone());
    (net, market)
}

fn draft(name: &str) -> AgentDraft {
    AgentDraft {
        name: name.to_string(),
        description: "x".to_string(),
        image: "https://i/x.png".to_string(),
        endpoints: Vec::new(),
        ..Default::default()
    }
}

fn response(hash: ContentDigest, status: ValidationStatus) -> ValidationResponseContent {
    ValidationResponseContent {
        request_hash: hash,
        response: status,
        comment: None,
        created_at: None,
        extensions: Default::default(),
    }
}

#[tokio::test]
async fn registered_agent_hydrates_with_metadata() {
    let (_net, market) = setup(50);
    let owner = StaticSigner::new(OWNER);

    let registered = market.register_agent(&draft("Bot"), &owner).await.unwrap();
    let content_id = uri::content_id(&registered.token_uri).unwrap();
    assert!(!content_id.is_empty());

    let agents = market.reader().list_owned_agents(OWNER).await.unwrap();
    assert_eq!(agents.len(), 1);
    let agent = &agents[0];
    assert_eq!(agent.token_uri, format!("walrus://{content_id}"));
    assert_eq!(agent.image, "https://i/x.png");
    let metadata = agent.metadata.as_ref().unwrap();
    assert_eq!(metadata.name.as_deref(), Some("Bot"));
}

#[tokio::test]
async fn feedback_increments_count_by_one() {
    let (_net, market) = setup(50);
    let owner = StaticSigner::new(OWNER);
    let client = StaticSigner::new(CLIENT);
    let agent = market.register_agent(&draft("Bot"), &owner).await.unwrap();
    let reader = market.reader();

    let before = reader.resolve_reputation_summary(agent.agent_id, None).await;
    market
        .give_feedback(
            agent.agent_id,
            85,
            FeedbackContent {
                comment: Some("fast and correct".to_string()),
                ..Default::default()
            },
            &client,
        )
        .await
        .unwrap();
    let after = reader.resolve_reputation_summary(agent.agent_id, Some(CLIENT)).await;

    assert_eq!(after.feedback_count, before.feedback_count + 1);
    assert_eq!(after.average_score, 85);
    assert!(after.feedbacks.is_empty());

    let full = reader.resolve_reputation(agent.agent_id, None).await;
    assert_eq!(full.feedbacks.len(), 1);
    assert_eq!(full.feedbacks[0].client, CLIENT);

    // The stored document is the one the on-chain hash covers.
    let doc: FeedbackContent = reader.resolve(&full.feedbacks[0].file_uri).await.unwrap();
    assert_eq!(doc.score, 85);
    assert_eq!(doc.agent_id, agent.agent_id);
}

#[tokio::test]
async fn one_unreadable_document_does_not_fail_the_batch() {
    let (net, market) = setup(2);
    let owner = StaticSigner::new(OWNER);
    let mut registered = Vec::new();
    for name in ["A", "B", "C", "D", "E"] {
        registered.push(market.register_agent(&draft(name), &owner).await.unwrap());
    }
    let broken = uri::content_id(&registered[2].token_uri).unwrap();
    net.make_unreadable(broken);

    let reader = market.reader();
    for agents in [
        reader.list_owned_agents(OWNER).await.unwrap(),
        reader.list_all_agents().await.unwrap(),
    ] {
        assert_eq!(agents.len(), 5);
        let missing: Vec<u64> = agents
            .iter()
            .filter(|a| a.metadata.is_none())
            .map(|a| a.agent_id)
            .collect();
        assert_eq!(missing, vec![registered[2].agent_id]);
    }
}

#[tokio::test]
async fn discovery_follows_every_page() {
    let (_net, market) = setup(3);
    let first_owner = StaticSigner::new(OWNER);
    let second_owner = StaticSigner::new(CLIENT);
    for i in 0..7 {
        let signer = if i % 2 == 0 { &first_owner } else { &second_owner };
        market
            .register_agent(&draft(&format!("agent-{i}")), signer)
            .await
            .unwrap();
    }

    let all = market.reader().list_all_agents().await.unwrap();
    let ids: Vec<u64> = all.iter().map(|a| a.agent_id).collect();
    assert_eq!(ids, (1..=7).collect::<Vec<u64>>());

    let fifth = market.reader().get_agent(5).await.unwrap();
    assert_eq!(fifth.name, "agent-4");
    assert_eq!(fifth.owner, OWNER);
}

#[tokio::test]
async fn reputation_falls_back_when_view_fails() {
    let (net, market) = setup(50);
    let owner = StaticSigner::new(OWNER);
    let client = StaticSigner::new(CLIENT);
    let agent = market.register_agent(&draft("Bot"), &owner).await.unwrap();
    market
        .give_feedback(agent.agent_id, 40, FeedbackContent::default(), &client)
        .await
        .unwrap();

    net.fail_simulation(true);
    let summary = market
        .reader()
        .resolve_reputation_summary(agent.agent_id, None)
        .await;
    assert_eq!(summary.feedback_count, 0);
    assert_eq!(summary.average_score, 0);
    assert!(summary.feedbacks.is_empty());
}

#[tokio::test]
async fn second_validation_response_wins() {
    let (_net, market) = setup(50);
    let owner = StaticSigner::new(OWNER);
    let validator = StaticSigner::new(VALIDATOR);
    let agent = market.register_agent(&draft("Bot"), &owner).await.unwrap();

    let requested = market
        .request_validation(
            &agent.object_id,
            VALIDATOR,
            ValidationRequestContent {
                agent_id: agent.agent_id,
                description: Some("check the endpoints".to_string()),
                ..Default::default()
            },
            &owner,
        )
        .await
        .unwrap();
    let hash = ContentDigest::from_hex(&requested.key).unwrap();

    for status in [ValidationStatus::Pending, ValidationStatus::Approved] {
        market
            .respond_validation(hash, status, response(hash, status), "audit", &validator)
            .await
            .unwrap();
    }

    let records = market
        .reader()
        .list_validations(&ValidationFilter {
            validator: Some(VALIDATOR.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, requested.key);
    let latest = records[0].response.as_ref().unwrap();
    assert_eq!(latest.response, ValidationStatus::Approved);
    assert_eq!(latest.tag, "audit");

    let none = market
        .reader()
        .list_validations(&ValidationFilter {
            agent_id: Some(agent.agent_id + 1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn metadata_update_keeps_extensions_and_old_blob() {
    let (_net, market) = setup(50);
    let owner = StaticSigner::new(OWNER);
    let agent = market.register_agent(&draft("Bot"), &owner).await.unwrap();
    let reader = market.reader();

    let mut metadata: AgentMetadata = reader.resolve(&agent.token_uri).await.unwrap();
    metadata.description = Some("v2".to_string());
    metadata
        .extensions
        .insert("x-pricing".to_string(), serde_json::json!({"perCall": "0.01"}));

    let record = market
        .update_metadata(&agent.object_id, &metadata, &owner)
        .await
        .unwrap();
    assert_ne!(record.anchored.uri, agent.token_uri);

    let hydrated = reader.get_agent(agent.agent_id).await.unwrap();
    assert_eq!(hydrated.token_uri, record.anchored.uri);
    assert_eq!(hydrated.metadata.as_ref(), Some(&metadata));

    let old: AgentMetadata = reader.resolve(&agent.token_uri).await.unwrap();
    assert_eq!(old.description.as_deref(), Some("x"));
}
