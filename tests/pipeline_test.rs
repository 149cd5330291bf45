//! Integration tests for the fetch, score, render, deliver pipeline

mod test_utils;

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use inbox_triage::anthropic::ContentBlock;
    use inbox_triage::triage::{Outcome, Pipeline, RenderMode, Scorer, TriageError};

    use crate::test_utils::{FakeMailbox, FakeModel, FakeNotifier, scores_json};

    const INBOX: &[(&str, &str, &str, &str)] = &[
        ("m0", "Prod database down", "oncall@example.com", "Primary is unreachable"),
        ("m1", "Team lunch", "social@example.com", "Tacos on Friday"),
        ("m2", "Contract review by EOD", "boss@example.com", "Please sign off today"),
        ("m3", "Your receipt", "noreply@shop.example", "Thanks for your order"),
        ("m4", "Weekly newsletter", "news@example.com", "Top stories"),
    ];

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 12).unwrap()
    }

    async fn run(
        mailbox: &FakeMailbox,
        model: FakeModel,
        notifier: &FakeNotifier,
        mode: RenderMode,
    ) -> anyhow::Result<Outcome> {
        let scorer = Scorer::new(Box::new(model), mode.schema());
        Pipeline {
            mailbox,
            scorer: &scorer,
            notifier,
            mode,
            query: "is:unread",
            max_results: 50,
        }
        .run(today())
        .await
    }

    /// Filter mode sends only the priority 5 and 4 emails, in one notification
    #[tokio::test]
    async fn it_sends_high_priority_emails_in_filter_mode() {
        let mailbox = FakeMailbox::new(INBOX);
        let model = FakeModel::text(&scores_json(&[5, 3, 4, 2, 1], false));
        let prompts = model.prompts.clone();
        let notifier = FakeNotifier::default();

        let outcome = run(&mailbox, model, &notifier, RenderMode::Filter).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Delivered {
                fetched: 5,
                included: 2
            }
        );
        assert_eq!(prompts.lock().unwrap().len(), 1);
        // One list call plus a metadata fetch per message
        assert_eq!(*mailbox.calls.lock().unwrap(), 6);

        let delivered = notifier.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        let text = &delivered[0];
        assert!(text.contains("Prod database down"));
        assert!(text.contains("Contract review by EOD"));
        assert!(!text.contains("Team lunch"));
        assert!(!text.contains("Your receipt"));
        assert!(!text.contains("Weekly newsletter"));
        assert!(text.find("Prod database down") < text.find("Contract review by EOD"));
    }

    /// Filter mode makes no delivery at all when nothing is urgent
    #[tokio::test]
    async fn it_sends_nothing_when_all_low_priority() {
        let mailbox = FakeMailbox::new(INBOX);
        let model = FakeModel::text(&scores_json(&[1, 2, 3, 3, 2], false));
        let notifier = FakeNotifier::default();

        let outcome = run(&mailbox, model, &notifier, RenderMode::Filter).await.unwrap();

        assert_eq!(outcome, Outcome::NothingToSend { fetched: 5 });
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }

    /// Digest mode sends every email, sorted by priority, even when all are low
    #[tokio::test]
    async fn it_sends_full_digest_sorted_by_priority() {
        let mailbox = FakeMailbox::new(&INBOX[..3]);
        let model = FakeModel::text(&scores_json(&[2, 5, 3], true));
        let notifier = FakeNotifier::default();

        let outcome = run(&mailbox, model, &notifier, RenderMode::Digest).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Delivered {
                fetched: 3,
                included: 3
            }
        );
        let delivered = notifier.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        let text = &delivered[0];
        assert!(text.starts_with("*📬 Email Digest — Nov 12, 2024 — 3 unread*"));

        let lunch = text.find("Team lunch").unwrap();
        let contract = text.find("Contract review by EOD").unwrap();
        let prod = text.find("Prod database down").unwrap();
        assert!(lunch < contract && contract < prod);
        assert!(text.contains("<https://mail.google.com/mail/u/0/#all/m1|Open in Gmail>"));
        assert_eq!(text.matches("⚡ *Action needed*").count(), 1);
    }

    /// Digest mode still sends when every email is low priority
    #[tokio::test]
    async fn it_sends_digest_even_when_all_low_priority() {
        let mailbox = FakeMailbox::new(INBOX);
        let model = FakeModel::text(&scores_json(&[1, 1, 2, 1, 1], true));
        let notifier = FakeNotifier::default();

        let outcome = run(&mailbox, model, &notifier, RenderMode::Digest).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Delivered {
                fetched: 5,
                included: 5
            }
        );
        assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    }

    /// An empty mailbox skips the model and the webhook entirely
    #[tokio::test]
    async fn it_stops_after_fetch_for_empty_mailbox() {
        let mailbox = FakeMailbox::empty();
        let model = FakeModel::text("[]");
        let prompts = model.prompts.clone();
        let notifier = FakeNotifier::default();

        let outcome = run(&mailbox, model, &notifier, RenderMode::Digest).await.unwrap();

        assert_eq!(outcome, Outcome::NoEmails);
        assert_eq!(*mailbox.calls.lock().unwrap(), 1);
        assert!(prompts.lock().unwrap().is_empty());
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }

    /// A response with a missing entry aborts before anything is sent
    #[tokio::test]
    async fn it_aborts_on_count_mismatch_without_delivering() {
        let mailbox = FakeMailbox::new(INBOX);
        let model = FakeModel::text(&scores_json(&[5, 4, 3, 2], false));
        let notifier = FakeNotifier::default();

        let err = run(&mailbox, model, &notifier, RenderMode::Filter)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TriageError>(),
            Some(TriageError::CountMismatch {
                expected: 5,
                actual: 4
            })
        ));
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }

    /// Thinking blocks and a code fence around the answer are tolerated
    #[tokio::test]
    async fn it_accepts_thinking_and_fenced_responses() {
        let mailbox = FakeMailbox::new(&INBOX[..2]);
        let model = FakeModel::blocks(vec![
            ContentBlock::thinking("The first email is an outage."),
            ContentBlock::text(&format!("```json\n{}\n```", scores_json(&[5, 2], false))),
        ]);
        let notifier = FakeNotifier::default();

        let outcome = run(&mailbox, model, &notifier, RenderMode::Filter).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Delivered {
                fetched: 2,
                included: 1
            }
        );
    }

    /// The prompt numbers every fetched email in fetch order
    #[tokio::test]
    async fn it_sends_every_email_in_one_prompt() {
        let mailbox = FakeMailbox::new(INBOX);
        let model = FakeModel::text(&scores_json(&[1, 1, 1, 1, 1], true));
        let prompts = model.prompts.clone();
        let notifier = FakeNotifier::default();

        run(&mailbox, model, &notifier, RenderMode::Digest).await.unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let positions: Vec<usize> = (1..=5)
            .map(|i| prompts[0].find(&format!("[{}]\nFrom:", i)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(prompts[0].contains("Subject: Contract review by EOD"));
    }

    /// Delivery failures are surfaced and not retried
    #[tokio::test]
    async fn it_surfaces_delivery_failure() {
        let mailbox = FakeMailbox::new(INBOX);
        let model = FakeModel::text(&scores_json(&[5, 3, 4, 2, 1], false));
        let notifier = FakeNotifier::failing();

        let err = run(&mailbox, model, &notifier, RenderMode::Filter)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to deliver notification"));
        assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    }
}
