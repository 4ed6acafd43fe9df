//! End-to-end retrieval and synthesis scenarios.
//!
//! These tests drive the public API with the mocks in `research::testing`:
//! 1. Region-filtered archive search that has to drop the region
//! 2. A full web-search outage
//! 3. A language model that keeps returning malformed JSON
//! 4. The duplicate-domain diversity penalty
//! 5. Citation integrity across both synthesis paths

use std::sync::Arc;

use research::quotes::query_terms;
use research::scoring::ScoreInput;
use research::testing::{FailingWebSearcher, MockArchive, MockLanguageModel, MockWebSearcher};
use research::{
    validate_citations, ArchiveClient, ArchiveQuery, EvidenceRecord, EvidenceSource,
    ResearchPipeline, ResearchRequest, Scorer, ScoringContext, SynthesisEngine, SynthesisMode,
    WebHit, WebSearchAggregator, WebSearchOptions, WebSearcher,
};
use serde_json::json;

const QUERY: &str = "Ashby ferry Harwood Shire Council";

fn article(id: &str, heading: &str, snippet: &str) -> serde_json::Value {
    json!({
        "id": id,
        "heading": heading,
        "date": "1912-05-01",
        "troveUrl": format!("https://trove.nla.gov.au/newspaper/article/{id}"),
        "snippet": snippet,
    })
}

fn ranked_evidence(n: usize) -> Vec<EvidenceRecord> {
    (1..=n)
        .map(|i| {
            let mut record = EvidenceRecord::new(
                EvidenceSource::Archive,
                i.to_string(),
                format!("Ferry notice {i}"),
                format!("https://trove.nla.gov.au/newspaper/article/{i}"),
            )
            .with_year(1900 + i as i32)
            .with_snippet(format!("The Ashby ferry was discussed at meeting {i}."));
            record.relevance_score = 1.0 - i as f64 / 20.0;
            record
        })
        .collect()
}

#[tokio::test]
async fn test_region_dropped_then_harwood_title_ranks_higher() {
    let snippet = "The Shire Council considered the Ashby ferry service.";
    let archive = Arc::new(
        MockArchive::new().empty_with_region().with_page(
            None,
            vec![
                article("100", "Harwood Shire Council", snippet),
                article("200", "Shire Council", snippet),
            ],
            None,
        ),
    );
    let client = ArchiveClient::new(archive.clone());

    let result = client
        .search(
            ArchiveQuery::new(QUERY)
                .years(Some(1900), Some(1925))
                .region(Some("New South Wales")),
        )
        .await
        .unwrap();

    let calls = archive.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].region.as_deref(), Some("New South Wales"));
    assert!(calls[1].region.is_none());
    assert!(result.region_dropped);
    assert!(!result.records.is_empty());

    let mut records = result.records;
    let ctx = ScoringContext::new(query_terms(QUERY)).with_year_range(Some(1900), Some(1925));
    Scorer::default().rank_records(&mut records, &ctx);

    let harwood = records.iter().find(|r| r.id == "ARCHIVE:100").unwrap();
    let other = records.iter().find(|r| r.id == "ARCHIVE:200").unwrap();
    assert!(harwood.relevance_score > other.relevance_score);
    assert_eq!(records[0].id, "ARCHIVE:100");
}

#[tokio::test]
async fn test_web_outage_returns_empty_and_pipeline_uses_archive() {
    let first = Arc::new(FailingWebSearcher::new("tavily"));
    let second = Arc::new(FailingWebSearcher::new("brave"));
    let providers: Vec<Arc<dyn WebSearcher>> = vec![first.clone(), second.clone()];
    let web = WebSearchAggregator::new(providers);

    let results = web
        .search_web(QUERY, WebSearchOptions::default().with_fetch_content(false))
        .await;
    assert!(results.is_empty());
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);

    let archive = MockArchive::new().with_page(
        None,
        vec![article("100", "Harwood Shire Council", "The Ashby ferry service.")],
        None,
    );
    let pipeline = ResearchPipeline::new(web).with_archive(ArchiveClient::new(Arc::new(archive)));
    let outcome = pipeline
        .run(ResearchRequest::new(QUERY).with_fetch_content(false))
        .await
        .unwrap();

    assert_eq!(outcome.stats.used, 1);
    assert!(outcome.evidence.iter().all(|r| r.source == EvidenceSource::Archive));
}

#[tokio::test]
async fn test_malformed_json_twice_falls_back() {
    let model = Arc::new(
        MockLanguageModel::new()
            .with_response("{\"overview\": \"The ferry\", \"keyFindings\": [")
            .with_response("```json\n{\"overview\": 42}\n```"),
    );
    let engine = SynthesisEngine::new(Some(model.clone()));
    let evidence = ranked_evidence(8);

    let findings = engine.synthesize(QUERY, &evidence).await;

    assert_eq!(model.calls(), 2);
    assert_eq!(findings.mode, SynthesisMode::Extractive);
    assert!(!findings.key_points.is_empty());
    assert!(findings.key_points.iter().all(|k| k.confidence == 0.5));

    let top5: Vec<&str> = evidence.iter().take(5).map(|r| r.id.as_str()).collect();
    assert!(findings.cited_ids().all(|id| top5.contains(&id)));
}

#[test]
fn test_second_same_domain_candidate_pays_diversity_penalty() {
    let text = "The Ashby ferry crossed to Harwood Island.";
    let input = |domain| ScoreInput {
        title: "Ashby ferry",
        text,
        year: None,
        published: None,
        domain,
    };
    let inputs = [
        input("ferries.example.com"),
        input("ferries.example.com"),
        input("harwood-history.com"),
    ];

    let ctx = ScoringContext::new(query_terms("Ashby ferry"));
    let breakdowns = Scorer::default().score_batch(&inputs, &ctx);

    assert_eq!(breakdowns[0].diversity_penalty, 0.0);
    assert_eq!(breakdowns[2].diversity_penalty, 0.0);
    assert!((breakdowns[1].diversity_penalty - 0.1).abs() < 1e-9);
    assert!((breakdowns[0].blended - breakdowns[1].blended - 0.1).abs() < 1e-9);
    assert!((breakdowns[2].blended - breakdowns[1].blended - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_citations_stay_inside_evidence() {
    let evidence = ranked_evidence(6);

    let fallback = SynthesisEngine::default().synthesize(QUERY, &evidence).await;
    assert!(validate_citations(&fallback, &evidence).is_ok());

    let response = json!({
        "overview": "The Ashby ferry was a council concern for decades.",
        "keyFindings": [{
            "title": "Council meetings",
            "insight": "The council discussed the ferry repeatedly.",
            "evidence": ["The Ashby ferry was discussed at meeting 1."],
            "citations": ["ARCHIVE:1", "ARCHIVE:3"],
            "confidence": 0.7
        }],
        "timeline": [{"date": "1901", "event": "First meeting", "citations": ["ARCHIVE:1"]}],
        "limitations": ["Only council notices were found."],
        "nextQuestions": []
    });
    let model = Arc::new(MockLanguageModel::new().with_response(response.to_string()));
    let synthesized = SynthesisEngine::new(Some(model)).synthesize(QUERY, &evidence).await;

    assert_eq!(synthesized.mode, SynthesisMode::Model);
    assert!(validate_citations(&synthesized, &evidence).is_ok());
    assert_eq!(synthesized.citations.len(), 2);
}

#[tokio::test]
async fn test_scores_stay_in_unit_range_across_sources() {
    let hits: Vec<WebHit> = (0..6)
        .map(|i| {
            WebHit::new("mock", format!("https://site{}.com/ferry/{i}", i % 2))
                .with_title(format!("Ferry page {i}"))
                .with_snippet("The Ashby ferry at Harwood.")
                .with_date("2019-06-01")
        })
        .collect();
    let providers: Vec<Arc<dyn WebSearcher>> =
        vec![Arc::new(MockWebSearcher::new("mock").with_default(hits))];
    let archive = MockArchive::new().with_page(
        None,
        vec![article("1", "Harwood ferry", "Ferry tenders at Harwood.")],
        None,
    );
    let pipeline = ResearchPipeline::new(WebSearchAggregator::new(providers))
        .with_archive(ArchiveClient::new(Arc::new(archive)));

    let outcome = pipeline
        .run(
            ResearchRequest::new(QUERY)
                .with_prefer_recent(true)
                .with_fetch_content(false),
        )
        .await
        .unwrap();

    assert!(outcome
        .evidence
        .iter()
        .all(|r| (0.0..=1.0).contains(&r.relevance_score)));
}
