use super::{
    document::{AccountDocument, DocumentSet, DocumentType},
    memory::MemoryAccountRepository,
    model::{
        Account, AccountStatus, AccountTier, AccountUpdate, NewAccount, PointKind, PointOperation, RelationshipStatus,
        DEFAULT_UNVERIFY_REASON, MAX_POINTS,
    },
    repository::{AccountRepositoryTrait, FieldGroup},
    statistics::{trend_start, AccountStatistics},
};

#[cfg(test)]
mod account_tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Utc};
    use mongodb::bson::{self, oid::ObjectId};
    use utils::AppError;

    fn sample_input(mobile: &str, aadhar: &str, pan: &str) -> NewAccount {
        NewAccount {
            user_type: AccountTier::Retailer,
            name: "Ravi Kumar".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            relationship_status: RelationshipStatus::Married,
            mobile: mobile.to_string(),
            email: Some("Ravi@Example.com".to_string()),
            aadhar_number: aadhar.to_string(),
            pan_number: pan.to_string(),
            pin_code: "560001".to_string(),
            state: "Karnataka".to_string(),
            city: "Bengaluru".to_string(),
            address: "12 MG Road".to_string(),
            point_percentage: 10,
            refer_code: None,
            dealer_code: None,
        }
    }

    fn sample_account() -> Account {
        Account::new(sample_input("9876543210", "123412341234", "ABCDE1234F"), ObjectId::new(), None)
    }

    fn sample_document(doc_type: DocumentType, filename: &str) -> AccountDocument {
        AccountDocument::new(
            doc_type,
            filename.to_string(),
            "scan.png".to_string(),
            "image/png".to_string(),
            2048,
        )
    }

    #[test]
    fn test_new_account_starts_empty() {
        let account = sample_account();

        assert_eq!(account.total_earned_points, 0);
        assert_eq!(account.available_points, 0);
        assert_eq!(account.refer_points, 0);
        assert_eq!(account.redeem_amount, 0);
        assert_eq!(account.total_referred_users, 0);
        assert!(account.referred_users.is_empty());
        assert!(!account.is_verified);
        assert!(account.verification_date.is_none());
        assert_eq!(account.status, AccountStatus::Active);
        assert!(account.documents.is_empty());
    }

    #[test]
    fn test_normalized_input() {
        let mut input = sample_input(" 9876543210 ", "123412341234", " abcde1234f ");
        input.email = Some("  ".to_string());
        input.refer_code = Some("".to_string());
        let input = input.normalized();

        assert_eq!(input.mobile, "9876543210");
        assert_eq!(input.pan_number, "ABCDE1234F");
        assert!(input.email.is_none());
        assert!(input.refer_code.is_none());

        let input = sample_input("9876543210", "123412341234", "ABCDE1234F").normalized();
        assert_eq!(input.email.as_deref(), Some("ravi@example.com"));
    }

    #[test]
    fn test_point_scenario() {
        let mut account = sample_account();

        // 入账 100 earned
        let balances = account.add_points(100, PointKind::Earned).unwrap();
        assert_eq!(balances.total_earned_points, 100);
        assert_eq!(balances.available_points, 100);

        // 入账 50 refer
        account.add_points(50, PointKind::Refer).unwrap();
        assert_eq!(account.refer_points, 50);
        assert_eq!(account.available_points, 150);
        assert_eq!(account.total_earned_points, 100);

        // 兑换 120
        account.deduct_points(120).unwrap();
        assert_eq!(account.available_points, 30);
        assert_eq!(account.redeem_amount, 120);

        // 余额不足：40 > 30，不做任何修改
        let before = account.balances();
        let err = account.deduct_points(40).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance {
                available: 30,
                requested: 40
            }
        ));
        assert_eq!(account.balances(), before);

        // available = earned + refer - redeem
        assert_eq!(
            account.available_points,
            account.total_earned_points + account.refer_points - account.redeem_amount
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut account = sample_account();

        assert!(matches!(account.add_points(0, PointKind::Earned), Err(AppError::BadRequest(_))));
        assert!(matches!(account.deduct_points(0), Err(AppError::BadRequest(_))));
        assert_eq!(account.available_points, 0);
    }

    #[test]
    fn test_add_beyond_storage_limit_rejected() {
        let mut account = sample_account();
        // 上限恰好可以入账
        account.add_points(MAX_POINTS, PointKind::Earned).unwrap();
        assert_eq!(account.available_points, i64::MAX as u64);

        let before = account.balances();
        assert!(matches!(account.add_points(1, PointKind::Earned), Err(AppError::BadRequest(_))));
        assert!(matches!(account.add_points(1, PointKind::Refer), Err(AppError::BadRequest(_))));
        assert_eq!(account.balances(), before);

        // 仍然可以正常写入文档
        let document = bson::to_document(&account).unwrap();
        assert_eq!(document.get_i64("availablePoints").unwrap(), i64::MAX);
    }

    #[test]
    fn test_set_beyond_storage_limit_rejected() {
        let mut account = sample_account();
        account.add_points(10, PointKind::Refer).unwrap();

        assert!(matches!(
            account.set_points(MAX_POINTS + 1, PointKind::Earned),
            Err(AppError::BadRequest(_))
        ));
        // earned + refer 超出上限同样拒绝
        assert!(matches!(
            account.set_points(MAX_POINTS, PointKind::Earned),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(account.total_earned_points, 0);
        assert_eq!(account.available_points, 10);
    }

    #[test]
    fn test_set_points_recomputes_available() {
        let mut account = sample_account();
        account.add_points(100, PointKind::Earned).unwrap();
        account.add_points(20, PointKind::Refer).unwrap();

        let balances = account.adjust_points(PointOperation::Set, 500, PointKind::Earned).unwrap();
        assert_eq!(balances.total_earned_points, 500);
        assert_eq!(balances.refer_points, 20);
        assert_eq!(balances.available_points, 520);
    }

    #[test]
    fn test_verify_then_unverify() {
        let mut account = sample_account();
        let admin = ObjectId::new();

        account.verify(admin);
        assert!(account.is_verified);
        assert!(account.verification_date.is_some());
        assert_eq!(account.verified_by, Some(admin));
        assert!(account.unverify_reason.is_empty());

        let other_admin = ObjectId::new();
        account.unverify(None, other_admin);
        assert!(!account.is_verified);
        assert!(account.verification_date.is_none());
        assert_eq!(account.verified_by, Some(other_admin));
        assert_eq!(account.unverify_reason, DEFAULT_UNVERIFY_REASON);

        account.unverify(Some("Blurry Aadhar scan"), admin);
        assert_eq!(account.unverify_reason, "Blurry Aadhar scan");

        // 再次认证时清空原因
        account.verify(admin);
        assert!(account.unverify_reason.is_empty());
    }

    #[test]
    fn test_attach_same_type_replaces() {
        let mut account = sample_account();

        let first = sample_document(DocumentType::PanCard, "pan-1.png");
        assert!(account.attach_document(first.clone()).is_none());

        let second = sample_document(DocumentType::PanCard, "pan-2.png");
        let replaced = account.attach_document(second.clone()).unwrap();
        assert_eq!(replaced.filename, "pan-1.png");

        assert_eq!(account.documents.len(), 1);
        assert_eq!(account.documents.get(DocumentType::PanCard).unwrap().filename, "pan-2.png");
        assert_eq!(second.url, "/uploads/documents/pan-2.png");
    }

    #[test]
    fn test_detach_document() {
        let mut account = sample_account();
        let front = sample_document(DocumentType::AadharFront, "front.png");
        let back = sample_document(DocumentType::AadharBack, "back.png");
        account.attach_document(front.clone());
        account.attach_document(back);

        let removed = account.detach_document(&front.id).unwrap();
        assert_eq!(removed.doc_type, DocumentType::AadharFront);
        assert_eq!(account.documents.len(), 1);
        assert!(account.detach_document(&front.id).is_none());
    }

    #[test]
    fn test_document_set_serializes_as_list() {
        let mut set = DocumentSet::default();
        set.upsert(sample_document(DocumentType::CancelledCheck, "check.pdf"));
        set.upsert(sample_document(DocumentType::AadharFront, "front.png"));

        let json = serde_json::to_value(&set).unwrap();
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["type"], "aadhar_front");
        assert_eq!(list[1]["type"], "cancelled_check");

        // 重复类型读取时后者覆盖前者
        let mut duplicated = list.clone();
        let mut extra = list[0].clone();
        extra["filename"] = "front-new.png".into();
        duplicated.push(extra);
        let set: DocumentSet = serde_json::from_value(serde_json::Value::Array(duplicated)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(DocumentType::AadharFront).unwrap().filename, "front-new.png");
    }

    #[test]
    fn test_account_bson_field_names() {
        let mut account = sample_account();
        account.add_points(7, PointKind::Earned).unwrap();
        let document = bson::to_document(&account).unwrap();

        assert!(document.get_object_id("_id").is_ok());
        assert_eq!(document.get_str("userType").unwrap(), "Retailer");
        assert_eq!(document.get_str("panNumber").unwrap(), "ABCDE1234F");
        assert_eq!(document.get_i32("availablePoints").unwrap(), 7);
        assert!(document.get_array("documents").unwrap().is_empty());

        let back: Account = bson::from_document(document).unwrap();
        assert_eq!(back.available_points, 7);
        assert_eq!(back.id, account.id);
    }

    #[test]
    fn test_apply_update() {
        let mut account = sample_account();
        let admin = ObjectId::new();
        let update = AccountUpdate {
            name: Some(" Ravi K ".to_string()),
            pan_number: Some("zzzzz9999z".to_string()),
            status: Some(AccountStatus::Suspended),
            ..Default::default()
        }
        .normalized();

        account.apply_update(update, admin);
        assert_eq!(account.name, "Ravi K");
        assert_eq!(account.pan_number, "ZZZZZ9999Z");
        assert_eq!(account.status, AccountStatus::Suspended);
        assert_eq!(account.updated_by, Some(admin));
        assert_eq!(account.mobile, "9876543210");
    }

    #[test]
    fn test_referral_code_matching() {
        let account = sample_account();

        assert!(account.matches_referral_code("9876543210"));
        assert!(account.matches_referral_code("123412341234"));
        assert!(account.matches_referral_code("abcde1234f"));
        assert!(!account.matches_referral_code(""));
        assert!(!account.matches_referral_code("9999999999"));
    }

    #[test]
    fn test_referred_user_count_tracks_list() {
        let mut account = sample_account();
        let a = ObjectId::new();
        let b = ObjectId::new();

        assert!(account.link_referred_user(a));
        assert!(!account.link_referred_user(a));
        assert!(account.link_referred_user(b));
        assert_eq!(account.total_referred_users, 2);

        assert!(account.unlink_referred_user(&a));
        assert!(!account.unlink_referred_user(&a));
        assert_eq!(account.total_referred_users, 1);
        assert_eq!(account.referred_users, vec![b]);
    }

    #[test]
    fn test_age_on() {
        let account = sample_account();

        assert_eq!(account.age_on(NaiveDate::from_ymd_opt(2026, 6, 14).unwrap()), 35);
        assert_eq!(account.age_on(NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()), 36);
    }

    #[test]
    fn test_statistics_from_accounts() {
        assert_eq!(AccountStatistics::from_accounts(Vec::<&Account>::new()), AccountStatistics::default());

        let mut verified = sample_account();
        verified.verify(ObjectId::new());
        verified.add_points(100, PointKind::Earned).unwrap();
        verified.deduct_points(40).unwrap();

        let mut executive = sample_account();
        executive.user_type = AccountTier::Executive;
        executive.status = AccountStatus::Inactive;
        executive.add_points(25, PointKind::Refer).unwrap();

        let stats = AccountStatistics::from_accounts([&verified, &executive]);
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.verified_users, 1);
        assert_eq!(stats.unverified_users, 1);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.executives, 1);
        assert_eq!(stats.total_points, 100);
        assert_eq!(stats.total_available_points, 85);
    }

    #[tokio::test]
    async fn test_memory_repository_unique_identity() {
        let repo = MemoryAccountRepository::new();
        let first = sample_account();
        repo.insert_account(&first).await.unwrap();

        let clash = Account::new(sample_input("9000000000", "123412341234", "PQRST6789K"), ObjectId::new(), None);
        let err = repo.insert_account(&clash).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateIdentity { ref field } if field == "Aadhar number"));
        assert_eq!(repo.len().await, 1);

        let found = repo.find_by_referral_code("abcde1234f").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_memory_repository_field_groups_do_not_overwrite() {
        let repo = MemoryAccountRepository::new();
        let account = sample_account();
        repo.insert_account(&account).await.unwrap();

        // 两份过期快照分别写入不同字段组
        let mut points_copy = account.clone();
        points_copy.add_points(100, PointKind::Earned).unwrap();
        let mut verify_copy = account.clone();
        verify_copy.verify(ObjectId::new());

        repo.update_fields(&points_copy, FieldGroup::Points).await.unwrap();
        repo.update_fields(&verify_copy, FieldGroup::Verification).await.unwrap();

        let stored = repo.find_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.available_points, 100);
        assert!(stored.is_verified);
    }

    #[tokio::test]
    async fn test_memory_repository_referrals() {
        let repo = MemoryAccountRepository::new();
        let referrer = sample_account();
        repo.insert_account(&referrer).await.unwrap();

        let referred = Account::new(
            sample_input("9000000001", "999988887777", "PQRST6789K"),
            ObjectId::new(),
            Some(referrer.id),
        );
        repo.insert_account(&referred).await.unwrap();

        repo.link_referral(&referrer.id, &referred.id).await.unwrap();
        repo.link_referral(&referrer.id, &referred.id).await.unwrap();
        let stored = repo.find_account(&referrer.id).await.unwrap().unwrap();
        assert_eq!(stored.referred_users, vec![referred.id]);
        assert_eq!(stored.total_referred_users, 1);

        assert_eq!(repo.find_referred_ids(&referrer.id).await.unwrap(), vec![referred.id]);

        repo.unlink_referral(&referrer.id, &referred.id).await.unwrap();
        let stored = repo.find_account(&referrer.id).await.unwrap().unwrap();
        assert_eq!(stored.total_referred_users, 0);

        let missing = repo.link_referral(&ObjectId::new(), &referred.id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_repository_statistics() {
        let repo = MemoryAccountRepository::new();
        let now = Utc::now();

        let empty = repo.statistics(trend_start(now)).await.unwrap();
        assert_eq!(empty.overview, AccountStatistics::default());
        assert!(empty.user_type_distribution.is_empty());
        assert!(empty.monthly_trend.is_empty());

        repo.insert_account(&sample_account()).await.unwrap();
        let stats = repo.statistics(trend_start(now)).await.unwrap();
        assert_eq!(stats.overview.total_users, 1);
        assert_eq!(stats.user_type_distribution.len(), 1);
        assert_eq!(stats.user_type_distribution[0].user_type, AccountTier::Retailer);
        assert_eq!(stats.monthly_trend.len(), 1);
        assert_eq!(stats.monthly_trend[0].year, now.year());
        assert_eq!(stats.monthly_trend[0].month, now.month());
    }
}
