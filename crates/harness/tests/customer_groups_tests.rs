mod common;

use crate::common::{id_of, test_case};
use serde_json::json;
use storeroom_harness::{ExpectedViolation, ListQuery, StatusCode, assert_validation_errors, violations};

const SCOPES: [&str; 2] = ["customer_group_read", "customer_group_write"];

#[tokio::test]
async fn test_customer_group_crud_chain() -> color_eyre::Result<()> {
    let mut case = test_case(&["customer_groups"], &SCOPES)?;
    assert_eq!(case.count_items("/customers/groups", &["customer_group_read"]).await?, 3);

    let payload = json!({
        "localizedNames": { "en-US": "Wholesale", "fr-FR": "Grossiste" },
        "reductionPercent": "12.50",
        "displayPriceTaxExcluded": true,
        "showPrice": false
    });
    let created = case
        .create_item("/customers/groups", payload.clone(), &["customer_group_write"])
        .await?;
    let group_id = id_of(&created, "customerGroupId")?;
    for (key, value) in payload.as_object().into_iter().flatten() {
        assert_eq!(&created[key], value, "Customer group data mismatch for key: {key}");
    }

    let uri = format!("/customers/groups/{group_id}");
    let updated = case
        .update_item(
            &uri,
            json!({
                "localizedNames": { "en-US": "Resellers" },
                "reductionPercent": 15,
                "displayPriceTaxExcluded": false,
                "showPrice": true
            }),
            &["customer_group_write"],
        )
        .await?;
    assert_eq!(updated["localizedNames"], json!({ "en-US": "Resellers" }));
    assert_eq!(updated["reductionPercent"], 15);

    let sorted = case
        .list_items(
            "/customers/groups",
            &["customer_group_read"],
            &ListQuery::new().order_by("localizedNames", "desc"),
        )
        .await?;
    // Visitor, Resellers, Guest, Customer
    assert_eq!(sorted.ids("customerGroupId"), vec![1, group_id, 2, 3]);

    case.delete_item(&uri, &["customer_group_write"]).await?;
    case.get_item_expecting(&uri, &["customer_group_read"], StatusCode::NOT_FOUND)
        .await?;

    case.tear_down()
}

#[tokio::test]
async fn test_customer_group_invalid_payloads() -> color_eyre::Result<()> {
    let mut case = test_case(&["customer_groups"], &SCOPES)?;

    let body = case
        .create_item_expecting(
            "/customers/groups",
            json!({
                "localizedNames": { "fr-FR": "Groupe", "it-IT": "Gruppo" },
                "reductionPercent": "-1",
                "showPrice": "yes"
            }),
            &["customer_group_write"],
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await?
        .unwrap_or_default();

    assert_validation_errors(
        &[
            ExpectedViolation::new("localizedNames", "Locale \"it-IT\" is not supported."),
            ExpectedViolation::new(
                "localizedNames",
                "The field localizedNames is required at least in your default language.",
            ),
            ExpectedViolation::new("reductionPercent", "This value should be between 0 and 100."),
            ExpectedViolation::new("displayPriceTaxExcluded", "This value should not be blank."),
            ExpectedViolation::new("showPrice", "This value should be of type bool."),
        ],
        &body,
    );

    let body = case
        .partial_update_item_expecting(
            "/customers/groups/1",
            json!({ "reductionPercent": "lots" }),
            &["customer_group_write"],
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await?
        .unwrap_or_default();
    assert_validation_errors(
        &violations(&[("reductionPercent", "This value should be of type numeric.")]),
        &body,
    );

    case.tear_down()
}
