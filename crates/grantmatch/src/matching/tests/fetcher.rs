use std::sync::Arc;
use std::time::{Duration, Instant};

use super::common::{applicant, opportunity, raw, ScriptedGenerator};
use crate::matching::enrichment::{
    Confidence, EnrichmentFetcher, GeneratorError, RetryPolicy,
};
use crate::matching::lexicon::MatchLexicon;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(500),
    }
}

#[test]
fn retry_delay_doubles_per_attempt() {
    let policy = fast_retry();
    assert_eq!(policy.delay(0), Duration::from_millis(500));
    assert_eq!(policy.delay(1), Duration::from_millis(1000));
    assert_eq!(policy.delay(2), Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn successful_batch_yields_cacheable_records() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Ok(vec![raw("a", 82.0, "high"), raw("b", 64.0, "medium")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator));
    let lexicon = MatchLexicon::standard();

    let first = opportunity("a");
    let second = opportunity("b");
    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&first, &second], None)
        .await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[&first.id].match_score, 82);
    assert_eq!(outcome.records[&first.id].confidence, Confidence::High);
    assert_eq!(outcome.generated.len(), 2);
    assert_eq!(outcome.fallbacks, 0);
    assert!(!outcome.degraded);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_until_success() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Err(GeneratorError::Transport("connection reset".to_string())));
    generator.push(Ok(vec![raw("a", 70.0, "high")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator)).with_retry(fast_retry());
    let lexicon = MatchLexicon::standard();

    let opp = opportunity("a");
    let outcome = fetcher.fetch(&lexicon, &applicant(), &[&opp], None).await;

    assert_eq!(generator.calls(), 2);
    assert_eq!(outcome.records[&opp.id].match_score, 70);
    assert!(!outcome.degraded);
    assert_eq!(outcome.fallbacks, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fall_back_without_caching() {
    // Empty script: every call errors.
    let generator = Arc::new(ScriptedGenerator::default());
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator)).with_retry(fast_retry());
    let lexicon = MatchLexicon::standard();

    let first = opportunity("a");
    let second = opportunity("b");
    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&first, &second], None)
        .await;

    assert_eq!(generator.calls(), 3);
    assert_eq!(outcome.fallbacks, 2);
    assert!(outcome.degraded);
    assert!(outcome.generated.is_empty());
    for opp in [&first, &second] {
        let record = &outcome.records[&opp.id];
        assert_eq!(record.match_score, 50);
        assert_eq!(record.confidence, Confidence::Low);
    }
}

#[tokio::test(start_paused = true)]
async fn disabled_generator_is_not_retried() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Err(GeneratorError::Disabled("no api key configured".to_string())));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator)).with_retry(fast_retry());
    let lexicon = MatchLexicon::standard();

    let opp = opportunity("a");
    let outcome = fetcher.fetch(&lexicon, &applicant(), &[&opp], None).await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(outcome.fallbacks, 1);
    assert!(outcome.degraded);
}

#[tokio::test(start_paused = true)]
async fn tiny_awards_and_closed_programs_skip_generation() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Ok(vec![raw("open", 75.0, "high")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator));
    let lexicon = MatchLexicon::standard();

    let mut tiny = opportunity("tiny");
    tiny.funding_max = Some(500);
    let mut closed = opportunity("closed");
    closed.summary = "Applications accepted by invitation only.".to_string();
    let open = opportunity("open");

    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&tiny, &closed, &open], None)
        .await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(outcome.prefiltered, 2);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[&tiny.id].confidence, Confidence::Low);
    assert_eq!(outcome.records[&open.id].match_score, 75);
    // Prefiltered fallbacks are not generation failures.
    assert!(!outcome.degraded);
    assert_eq!(outcome.generated.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_records_are_repaired_with_fallbacks() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut missing_id = raw("", 70.0, "high");
    missing_id.opportunity_id = None;
    generator.push(Ok(vec![
        raw("a", 88.0, "high"),
        missing_id,
        raw("b", 150.0, "high"),
        raw("never-requested", 90.0, "high"),
    ]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator));
    let lexicon = MatchLexicon::standard();

    let first = opportunity("a");
    let second = opportunity("b");
    let third = opportunity("c");
    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&first, &second, &third], None)
        .await;

    assert_eq!(outcome.generated.len(), 1);
    assert_eq!(outcome.generated[0].0, first.id);
    assert_eq!(outcome.fallbacks, 2);
    assert_eq!(outcome.records[&first.id].match_score, 88);
    assert_eq!(outcome.records[&second.id].match_score, 50);
    assert_eq!(outcome.records[&third.id].match_score, 50);
    assert!(!outcome.records.contains_key(&crate::matching::domain::OpportunityId(
        "never-requested".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn unrecognized_confidence_rejects_the_record() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Ok(vec![raw("a", 80.0, "certain")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator));
    let lexicon = MatchLexicon::standard();

    let opp = opportunity("a");
    let outcome = fetcher.fetch(&lexicon, &applicant(), &[&opp], None).await;

    assert!(outcome.generated.is_empty());
    assert_eq!(outcome.fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn candidates_are_split_into_bounded_batches() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Ok(vec![raw("a", 60.0, "medium"), raw("b", 61.0, "medium")]));
    generator.push(Ok(vec![raw("c", 62.0, "medium")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator)).with_batch_size(2);
    let lexicon = MatchLexicon::standard();

    let first = opportunity("a");
    let second = opportunity("b");
    let third = opportunity("c");
    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&first, &second, &third], None)
        .await;

    assert_eq!(generator.calls(), 2);
    assert_eq!(outcome.generated.len(), 3);
    assert_eq!(outcome.fallbacks, 0);
}

#[tokio::test(start_paused = true)]
async fn one_failed_batch_does_not_poison_the_next() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Err(GeneratorError::Malformed("not json".to_string())));
    generator.push(Err(GeneratorError::Malformed("not json".to_string())));
    generator.push(Err(GeneratorError::Malformed("not json".to_string())));
    generator.push(Ok(vec![raw("b", 73.0, "high")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator))
        .with_retry(fast_retry())
        .with_batch_size(1);
    let lexicon = MatchLexicon::standard();

    let first = opportunity("a");
    let second = opportunity("b");
    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&first, &second], None)
        .await;

    assert_eq!(generator.calls(), 4);
    assert_eq!(outcome.records[&first.id].match_score, 50);
    assert_eq!(outcome.records[&second.id].match_score, 73);
    assert!(outcome.degraded);
    assert_eq!(outcome.fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_falls_back_without_calling_the_generator() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator.push(Ok(vec![raw("a", 90.0, "high")]));
    let fetcher = EnrichmentFetcher::new(Arc::clone(&generator));
    let lexicon = MatchLexicon::standard();

    let opp = opportunity("a");
    let outcome = fetcher
        .fetch(&lexicon, &applicant(), &[&opp], Some(Instant::now()))
        .await;

    assert_eq!(generator.calls(), 0);
    assert!(outcome.degraded);
    assert_eq!(outcome.fallbacks, 1);
    assert!(outcome.generated.is_empty());
}
