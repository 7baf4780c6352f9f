#![allow(dead_code)]

use serde_json::{Value, json};

pub fn zone_payload(name: &str) -> Value {
    json!({ "name": name, "enabled": true })
}

pub fn customer_group_payload(name: &str) -> Value {
    json!({
        "localizedNames": { "en-US": name, "fr-FR": name },
        "reductionPercent": "10.5",
        "displayPriceTaxExcluded": true,
        "showPrice": true
    })
}

pub fn customer_payload(group_id: u64) -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "defaultGroupId": group_id
    })
}

pub fn address_payload(customer_id: u64) -> Value {
    json!({
        "customerId": customer_id,
        "alias": "Home",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "address1": "12 Analytical Engine Street",
        "postCode": "75001",
        "city": "Paris"
    })
}

pub fn tax_payload(name: &str, rate: &str) -> Value {
    json!({
        "localizedNames": { "en-US": name },
        "rate": rate,
        "enabled": true
    })
}

pub const ALL_ZONE_SCOPES: [&str; 2] = ["zone_read", "zone_write"];
