//! End-to-end evaluation through the in-memory adapters.

mod common;

use std::sync::Arc;

use common::{bocce_post, echo_of, reddit_post, t, verdict, Harness, ScriptedModel, REPLY};
use replyhound_core::{
    ButtonKind, FeedbackKind, LeadStore, ModelError, NewBusiness, Platform, ResponseStatus,
};
use replyhound_pipeline::guidance::SUBTLE_DIRECTIVE;
use replyhound_pipeline::{EvaluateOptions, Outcome};

fn chat() -> Option<String> {
    Some("chat-1".to_string())
}

#[tokio::test]
async fn bocce_post_becomes_one_lead_and_one_notification() {
    let h = Harness::new(ScriptedModel::new().score(Ok(verdict(8))));
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(chat()), t(0))
        .await
        .unwrap();
    let Outcome::Persisted {
        response_id,
        verdict,
        notified,
        ..
    } = outcome
    else {
        panic!("expected a persisted lead, got {outcome:?}");
    };
    assert_eq!(verdict.intent_score, 8);
    assert!(notified);

    let leads = h.store.leads().await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].lead.intent_score, 8);
    assert_eq!(leads[0].lead.campaign_id, Some(target.campaign.id));
    assert_eq!(leads[0].lead.platform, Platform::Facebook);

    let responses = h.store.responses().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, response_id);
    assert_eq!(responses[0].status, ResponseStatus::Pending);
    assert!(!responses[0].content.trim().is_empty());

    let sent = h.messenger.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat, "chat-1");
    assert!(sent[0].text.contains("New lead for Pinstripes"));
    assert!(sent[0].text.contains("8/10"));

    let feedback_row = sent[0]
        .buttons
        .iter()
        .find(|row| {
            row.iter()
                .any(|b| matches!(&b.kind, ButtonKind::Callback(d) if d.starts_with("fb:")))
        })
        .expect("feedback row");
    assert_eq!(feedback_row.len(), 4);
    let labels: Vec<&str> = feedback_row.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(
        labels,
        FeedbackKind::ALL.iter().map(|k| k.label()).collect::<Vec<_>>()
    );
    assert!(sent[0]
        .buttons
        .iter()
        .flatten()
        .all(|b| !b.label.contains("Post this reply")));
}

#[tokio::test]
async fn same_post_twice_is_a_duplicate() {
    let h = Harness::new(ScriptedModel::new());
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;
    let options = EvaluateOptions::automated(chat());

    let first = h.pipeline.evaluate(&target, &bocce_post(), &options, t(0)).await.unwrap();
    assert_eq!(first.label(), "persisted");
    let second = h.pipeline.evaluate(&target, &bocce_post(), &options, t(5)).await.unwrap();
    assert_eq!(second, Outcome::Duplicate);

    assert_eq!(h.model.scores_called(), 1);
    assert_eq!(h.store.leads().await.len(), 1);
    assert_eq!(h.messenger.sent().await.len(), 1);
}

#[tokio::test]
async fn same_post_is_evaluated_once_per_business() {
    let h = Harness::new(ScriptedModel::new());
    let a = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;
    let b = h.business("Acme Bowling", Platform::Facebook, &["bocce"]).await;
    let options = EvaluateOptions::automated(None);

    for target in [&a, &b] {
        let outcome = h.pipeline.evaluate(target, &bocce_post(), &options, t(0)).await.unwrap();
        assert_eq!(outcome.label(), "persisted");
    }
    assert_eq!(h.store.leads().await.len(), 2);
}

#[tokio::test]
async fn keyword_miss_never_reaches_the_model() {
    let h = Harness::new(ScriptedModel::new());
    let target = h.business("Pinstripes", Platform::Facebook, &["pizza party"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(chat()), t(0))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NoKeywordMatch);
    assert_eq!(h.model.scores_called(), 0);
}

#[tokio::test]
async fn manual_scan_without_keywords_matches_nothing() {
    let h = Harness::new(ScriptedModel::new());
    let business = h
        .store
        .create_business_with_campaign(&NewBusiness {
            name: "No Campaigns".to_string(),
            business_type: "venue".to_string(),
            core_offering: "Bocce courts".to_string(),
            ..NewBusiness::default()
        })
        .await
        .unwrap();

    let target = h
        .pipeline
        .manual_target(business.id, Some("https://www.facebook.com/groups/x/posts/1"))
        .await
        .unwrap();
    assert!(!target.campaign.is_persisted());
    assert!(target.campaign.keywords.is_empty());

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::manual(chat()), t(0))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NoKeywordMatch);
}

#[tokio::test]
async fn manual_target_unions_keywords_and_prefers_platform_campaign() {
    let h = Harness::new(ScriptedModel::new());
    let fb = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;
    let reddit = h
        .store
        .add_campaign(
            fb.business.id,
            Platform::Reddit,
            vec!["team building".to_string(), "Bocce".to_string()],
            vec!["chicago".to_string()],
        )
        .await;

    let target = h
        .pipeline
        .manual_target(fb.business.id, Some("https://old.reddit.com/r/chicago/comments/abc"))
        .await
        .unwrap();
    assert_eq!(target.campaign.id, reddit.id);
    assert_eq!(target.campaign.keywords, vec!["bocce", "team building"]);

    let linkedin = h
        .pipeline
        .manual_target(fb.business.id, Some("https://www.linkedin.com/feed/update/1"))
        .await
        .unwrap();
    assert_eq!(linkedin.campaign.platform, Platform::Linkedin);
    assert!(!linkedin.campaign.is_persisted());
}

#[tokio::test]
async fn manual_target_rejects_unknown_business() {
    let h = Harness::new(ScriptedModel::new());
    assert!(h.pipeline.manual_target(999, None).await.is_err());
}

#[tokio::test]
async fn manual_scans_use_the_lower_threshold() {
    let h = Harness::new(
        ScriptedModel::new()
            .score(Ok(verdict(6)))
            .score(Ok(verdict(6))),
    );
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let automated = h
        .pipeline
        .evaluate(&target, &reddit_post("a1", "Bocce?"), &EvaluateOptions::automated(None), t(0))
        .await
        .unwrap();
    assert!(
        matches!(automated, Outcome::Rejected { threshold: 7, .. }),
        "{automated:?}"
    );

    let manual = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::manual(None), t(0))
        .await
        .unwrap();
    assert_eq!(manual.label(), "persisted");
    assert_eq!(h.store.leads().await.len(), 1);
}

#[tokio::test]
async fn not_a_lead_is_rejected_regardless_of_score() {
    let mut v = verdict(9);
    v.is_lead = false;
    let h = Harness::new(ScriptedModel::new().score(Ok(v)));
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(chat()), t(0))
        .await
        .unwrap();
    assert_eq!(outcome.label(), "rejected");
    assert_eq!(h.model.generates_called(), 0);
    assert!(h.messenger.sent().await.is_empty());
}

#[tokio::test]
async fn malformed_verdict_is_retried_once() {
    let h = Harness::new(
        ScriptedModel::new()
            .score(Err(ModelError::Malformed("not json".to_string())))
            .score(Ok(verdict(8))),
    );
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(None), t(0))
        .await
        .unwrap();
    assert_eq!(outcome.label(), "persisted");
    assert_eq!(h.model.scores_called(), 2);
}

#[tokio::test]
async fn second_malformed_verdict_drops_the_candidate() {
    let h = Harness::new(
        ScriptedModel::new()
            .score(Err(ModelError::Malformed("not json".to_string())))
            .score(Err(ModelError::Malformed("still not json".to_string()))),
    );
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(None), t(0))
        .await
        .unwrap();
    assert_eq!(outcome.label(), "dropped");
    assert_eq!(h.model.scores_called(), 2);
    assert!(h.store.leads().await.is_empty());
}

#[tokio::test]
async fn transient_scoring_errors_are_retried() {
    let h = Harness::new(
        ScriptedModel::new()
            .score(Err(ModelError::RateLimited("slow down".to_string())))
            .score(Err(ModelError::Connection("reset".to_string())))
            .score(Ok(verdict(9))),
    );
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(None), t(0))
        .await
        .unwrap();
    assert_eq!(outcome.label(), "persisted");
    assert_eq!(h.model.scores_called(), 3);
}

#[tokio::test]
async fn generation_failure_persists_nothing_and_keeps_the_claim() {
    let h = Harness::new(ScriptedModel::new().reply(Err(ModelError::EmptyOutput)));
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;
    let options = EvaluateOptions::automated(chat());

    let outcome = h.pipeline.evaluate(&target, &bocce_post(), &options, t(0)).await.unwrap();
    assert_eq!(outcome.label(), "dropped");
    assert!(h.store.leads().await.is_empty());
    assert!(h.store.responses().await.is_empty());
    assert!(h.messenger.sent().await.is_empty());

    let again = h.pipeline.evaluate(&target, &bocce_post(), &options, t(60)).await.unwrap();
    assert_eq!(again, Outcome::Duplicate);
}

#[tokio::test]
async fn blank_generation_is_dropped() {
    let h = Harness::new(ScriptedModel::new().reply(Ok("   \n".to_string())));
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;

    let outcome = h
        .pipeline
        .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(None), t(0))
        .await
        .unwrap();
    assert_eq!(outcome.label(), "dropped");
    assert!(h.store.responses().await.is_empty());
}

#[tokio::test]
async fn our_own_published_reply_is_skipped() {
    let h = Harness::new(ScriptedModel::new());
    let target = h.business("Pinstripes", Platform::Reddit, &["bocce"]).await;
    h.pipeline.ledger().record_published(REPLY).await.unwrap();

    let outcome = h
        .pipeline
        .evaluate(&target, &echo_of(REPLY), &EvaluateOptions::automated(chat()), t(0))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::SelfEcho);
    assert_eq!(h.model.scores_called(), 0);
}

#[tokio::test]
async fn salesy_feedback_steers_the_next_reply() {
    let h = Harness::new(ScriptedModel::new());
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;
    let options = EvaluateOptions::automated(None);

    let Outcome::Persisted { response_id, .. } =
        h.pipeline.evaluate(&target, &bocce_post(), &options, t(0)).await.unwrap()
    else {
        panic!("expected a persisted lead");
    };
    h.store
        .insert_feedback_if_absent(response_id, FeedbackKind::TooSalesy)
        .await
        .unwrap();

    h.pipeline
        .evaluate(&target, &reddit_post("b2", "Bocce league recs?"), &options, t(10))
        .await
        .unwrap();
    assert_eq!(h.model.guidance_seen(), vec![String::new(), SUBTLE_DIRECTIVE.to_string()]);
}

#[tokio::test]
async fn batch_summary_counts_each_outcome() {
    let h = Harness::new(
        ScriptedModel::new()
            .score(Ok(verdict(8)))
            .score(Ok(verdict(3))),
    );
    let target = h.business("Pinstripes", Platform::Reddit, &["bocce"]).await;
    let posts = vec![
        reddit_post("c1", "Bocce team night?"),
        reddit_post("c2", "Bocce rules"),
        reddit_post("c1", "Bocce team night?"),
    ];

    let summary = h
        .pipeline
        .run_batch(&target, &posts, &EvaluateOptions::automated(None), t(0))
        .await;
    assert_eq!(summary.evaluated, 3);
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_evaluations_of_one_post_score_once() {
    let h = Harness::new(ScriptedModel::new());
    let target = h.business("Pinstripes", Platform::Facebook, &["bocce"]).await;
    let pipeline = Arc::new(h.pipeline);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let target = target.clone();
            tokio::spawn(async move {
                pipeline
                    .evaluate(&target, &bocce_post(), &EvaluateOptions::automated(chat()), t(0))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let persisted = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Persisted { .. }))
        .count();
    assert_eq!(persisted, 1);
    assert_eq!(outcomes.iter().filter(|o| **o == Outcome::Duplicate).count(), 7);
    assert_eq!(h.model.scores_called(), 1);
    assert_eq!(h.store.leads().await.len(), 1);
    assert_eq!(h.messenger.sent().await.len(), 1);
}
