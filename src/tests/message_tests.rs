//! tests/message_tests.rs
//! Reconciliación de mensajes ante cambios de filtros.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::errors::ServiceError;
    use crate::models::message_model::{MessageRecord, MessageStatus};
    use crate::services::message_service::ReconcileOutcome;
    use crate::tests::support::{code, tag, TestServices};

    fn client_ids(messages: &[MessageRecord]) -> Vec<String> {
        let mut ids: Vec<String> = messages.iter().map(|m| m.client_id.clone()).collect();
        ids.sort();
        ids
    }

    #[actix_rt::test]
    async fn creation_inserts_one_pending_message_per_recipient() {
        let s = TestServices::offline().await;
        let a = s.client(Some("vip"), Some("900"), 0).await;
        let b = s.client(Some("vip"), None, 0).await;
        let _c = s.client(Some("gold"), None, 0).await;

        let now = Utc::now();
        // `a` entra por los dos filtros, pero solo recibe un mensaje
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip"), code("900")])
            .await;

        let messages = s.messages.list_messages(&created.campaign.id).await.unwrap();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(client_ids(&messages), expected);
        assert!(messages
            .iter()
            .all(|m| m.status == MessageStatus::Pending && m.sent_at.is_none()));
    }

    #[actix_rt::test]
    async fn reconcile_twice_changes_nothing() {
        let s = TestServices::offline().await;
        s.client(Some("vip"), None, 0).await;
        s.client(Some("vip"), None, 3).await;

        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip")])
            .await;
        let id = &created.campaign.id;

        let before = s.messages.list_messages(id).await.unwrap();
        let first = s.messages.reconcile(id).await.unwrap();
        let second = s.messages.reconcile(id).await.unwrap();
        let after = s.messages.list_messages(id).await.unwrap();

        assert_eq!(first, ReconcileOutcome::default());
        assert_eq!(second, ReconcileOutcome::default());
        assert_eq!(before, after);
    }

    #[actix_rt::test]
    async fn replacing_filter_swaps_only_single_matched_recipients() {
        let s = TestServices::offline().await;
        let vip_only = s.client(Some("vip"), None, 0).await;
        let gold = s.client(Some("gold"), None, 0).await;

        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip")])
            .await;
        let id = &created.campaign.id;
        let filter_id = &created.filters[0].id;

        let (filter, outcome) = s
            .messages
            .replace_filter(id, filter_id, tag("gold"))
            .await
            .unwrap();

        assert_eq!(filter.value, "gold");
        assert_eq!(outcome, ReconcileOutcome { inserted: 1, deleted: 1 });

        let messages = s.messages.list_messages(id).await.unwrap();
        assert_eq!(client_ids(&messages), vec![gold.id.clone()]);
        assert!(!messages.iter().any(|m| m.client_id == vip_only.id));
        assert_eq!(messages[0].status, MessageStatus::Pending);

        let stored = s.campaigns.list_filters(id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, "gold");
    }

    #[actix_rt::test]
    async fn replacing_filter_keeps_recipients_matched_by_other_filters() {
        let s = TestServices::offline().await;
        let both = s.client(Some("vip"), Some("900"), 0).await;

        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip"), code("900")])
            .await;
        let id = &created.campaign.id;
        let before = s.messages.list_messages(id).await.unwrap();

        let vip_filter = created.filters.iter().find(|f| f.value == "vip").unwrap();
        let (_, outcome) = s
            .messages
            .replace_filter(id, &vip_filter.id, tag("nobody"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::default());
        let after = s.messages.list_messages(id).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(after[0].client_id, both.id);
    }

    #[actix_rt::test]
    async fn sent_messages_survive_any_filter_edit() {
        let s = TestServices::offline().await;
        let sent_client = s.client(Some("vip"), None, 0).await;
        let pending_client = s.client(Some("vip"), None, 0).await;

        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip")])
            .await;
        let id = &created.campaign.id;

        let messages = s.messages.list_messages(id).await.unwrap();
        let sent_msg = messages
            .iter()
            .find(|m| m.client_id == sent_client.id)
            .unwrap();
        assert!(s.messages.mark_sent(&sent_msg.id, Utc::now()).await.unwrap());

        // Cambio de filtro: el enviado sigue, el pendiente se va
        s.messages
            .replace_filter(id, &created.filters[0].id, tag("gold"))
            .await
            .unwrap();
        let after = s.messages.list_messages(id).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, sent_msg.id);
        assert_eq!(after[0].status, MessageStatus::Sent);
        assert!(!after.iter().any(|m| m.client_id == pending_client.id));

        // Volver al filtro original no duplica al ya enviado
        s.messages
            .replace_filter(id, &created.filters[0].id, tag("vip"))
            .await
            .unwrap();
        let back = s.messages.list_messages(id).await.unwrap();
        assert_eq!(back.len(), 2);
        let sent_again: Vec<_> = back
            .iter()
            .filter(|m| m.client_id == sent_client.id)
            .collect();
        assert_eq!(sent_again.len(), 1);
        assert_eq!(sent_again[0].status, MessageStatus::Sent);

        // Sin filtros: solo queda el enviado
        s.messages
            .remove_filter(id, &created.filters[0].id)
            .await
            .unwrap();
        let cleared = s.messages.list_messages(id).await.unwrap();
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].status, MessageStatus::Sent);
    }

    #[actix_rt::test]
    async fn mark_sent_is_conditional_on_pending() {
        let s = TestServices::offline().await;
        s.client(Some("vip"), None, 0).await;

        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip")])
            .await;
        let msg = &s.messages.list_messages(&created.campaign.id).await.unwrap()[0];

        assert!(s.messages.mark_sent(&msg.id, Utc::now()).await.unwrap());
        assert!(!s.messages.mark_sent(&msg.id, Utc::now()).await.unwrap());
        assert!(!s.messages.mark_sent("no-such-message", Utc::now()).await.unwrap());
    }

    #[actix_rt::test]
    async fn adding_filter_targets_new_recipients_once() {
        let s = TestServices::offline().await;
        let vip = s.client(Some("vip"), Some("900"), 0).await;
        let coded = s.client(None, Some("900"), 0).await;

        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip")])
            .await;
        let id = &created.campaign.id;

        let (_, outcome) = s.messages.add_filter(id, code("900")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome { inserted: 1, deleted: 0 });

        let mut expected = vec![vip.id, coded.id];
        expected.sort();
        assert_eq!(client_ids(&s.messages.list_messages(id).await.unwrap()), expected);
    }

    #[actix_rt::test]
    async fn unknown_filter_or_campaign_is_not_found() {
        let s = TestServices::offline().await;
        let now = Utc::now();
        let created = s
            .campaign(now, now + Duration::hours(1), vec![tag("vip")])
            .await;

        let err = s
            .messages
            .replace_filter(&created.campaign.id, "missing", tag("gold"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NotFound { .. })
        ));

        let err = s.messages.reconcile("missing-campaign").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NotFound { .. })
        ));

        let err = s
            .messages
            .add_filter("missing-campaign", tag("vip"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NotFound { .. })
        ));
    }
}
