//! Invoice CRUD integration tests for invoicing-service.

mod common;

use common::{invoice_body, invoice_number, money, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn create_invoice_derives_total_and_records_sale() {
    let app = TestApp::spawn().await;
    let number = invoice_number();

    let invoice = app
        .create_invoice(&invoice_body(
            &number,
            &[("Widget", 2, "10.00"), ("Gadget", 1, "5.50")],
        ))
        .await;

    assert_eq!(invoice["status"], "pending");
    assert_eq!(money(&invoice["total_amount"]), "25.50".parse::<Decimal>().unwrap());
    assert_eq!(invoice["created_by"], app.user_id.as_str());
    assert_eq!(invoice["items"].as_array().unwrap().len(), 2);
    assert_eq!(money(&invoice["items"][0]["total_price"]), "20.00".parse::<Decimal>().unwrap());

    let transactions = invoice["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["transaction_type"], "sale");
    assert_eq!(money(&transactions[0]["amount"]), "25.50".parse::<Decimal>().unwrap());
    assert_eq!(transactions[0]["description"], format!("Sale for invoice {}", number));
}

#[tokio::test]
async fn create_invoice_without_items_has_zero_total() {
    let app = TestApp::spawn().await;

    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[]))
        .await;

    assert_eq!(money(&invoice["total_amount"]), Decimal::ZERO);
    assert!(invoice["items"].as_array().unwrap().is_empty());
    assert_eq!(money(&invoice["transactions"][0]["amount"]), Decimal::ZERO);
}

#[tokio::test]
async fn create_invoice_ignores_client_supplied_total_and_status() {
    let app = TestApp::spawn().await;
    let mut body = invoice_body(&invoice_number(), &[("Widget", 1, "4.00")]);
    body["total_amount"] = json!("999.00");
    body["status"] = json!("paid");

    let invoice = app.create_invoice(&body).await;

    assert_eq!(invoice["status"], "pending");
    assert_eq!(money(&invoice["total_amount"]), "4.00".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn create_invoice_rejects_invalid_input() {
    let app = TestApp::spawn().await;

    let mut bad_email = invoice_body(&invoice_number(), &[]);
    bad_email["customer_email"] = json!("not-an-email");
    let response = app.post("/invoices", &bad_email).await;
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation_error");

    let zero_quantity = invoice_body(&invoice_number(), &[("Widget", 0, "1.00")]);
    let response = app.post("/invoices", &zero_quantity).await;
    assert_eq!(response.status().as_u16(), 422);

    let negative_price = invoice_body(&invoice_number(), &[("Widget", 1, "-1.00")]);
    let response = app.post("/invoices", &negative_price).await;
    assert_eq!(response.status().as_u16(), 422);

    let sub_cent = invoice_body(&invoice_number(), &[("Widget", 1, "1.005")]);
    let response = app.post("/invoices", &sub_cent).await;
    assert_eq!(response.status().as_u16(), 422);

    // Nothing was persisted
    let response = app.get("/invoices").await;
    let list: Vec<Value> = response.json().await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn duplicate_invoice_number_is_rejected() {
    let app = TestApp::spawn().await;
    let number = invoice_number();
    app.create_invoice(&invoice_body(&number, &[])).await;

    let response = app.post("/invoices", &invoice_body(&number, &[])).await;
    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/invoices"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn overlong_user_header_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .as_user(&"u".repeat(256))
        .post("/invoices", &invoice_body(&invoice_number(), &[]))
        .await;

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn invoices_of_other_users_are_not_found() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 1, "10.00")]))
        .await;
    let id = invoice["id"].as_str().unwrap();
    let other = app.as_user("someone-else");

    let response = other.get(&format!("/invoices/{}", id)).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = other
        .patch(&format!("/invoices/{}", id), &json!({ "customer_name": "Mallory" }))
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = other.delete(&format!("/invoices/{}", id)).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = other.pay(id, &json!({ "amount": "10.00" })).await;
    assert_eq!(response.status().as_u16(), 404);

    let list: Vec<Value> = other.get("/invoices").await.json().await.unwrap();
    assert!(list.is_empty());

    // Untouched for the owner
    let owned: Value = app.get(&format!("/invoices/{}", id)).await.json().await.unwrap();
    assert_eq!(owned["customer_name"], "Acme Corp");
    assert_eq!(owned["status"], "pending");
}

#[tokio::test]
async fn list_invoices_returns_summaries_newest_first() {
    let app = TestApp::spawn().await;
    let first = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 1, "1.00")]))
        .await;
    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    let second = app
        .create_invoice(&invoice_body(
            &invoice_number(),
            &[("Widget", 1, "1.00"), ("Gadget", 2, "2.00")],
        ))
        .await;

    let list: Vec<Value> = app.get("/invoices").await.json().await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], second["id"]);
    assert_eq!(list[0]["items_count"], 2);
    assert_eq!(list[1]["id"], first["id"]);
    assert_eq!(list[1]["items_count"], 1);
}

#[tokio::test]
async fn update_changes_fields_and_replaces_items() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 2, "10.00")]))
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/invoices/{}", id),
            &json!({
                "customer_name": "Globex",
                "items": [{ "description": "Service", "quantity": 3, "unit_price": "15.00" }],
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();

    assert_eq!(updated["customer_name"], "Globex");
    assert_eq!(updated["customer_email"], "billing@acme.test");
    assert_eq!(money(&updated["total_amount"]), "45.00".parse::<Decimal>().unwrap());
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);
    // The sale recorded at creation stays as it was
    let transactions = updated["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(money(&transactions[0]["amount"]), "20.00".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn patch_without_items_keeps_items_and_total() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 2, "10.00")]))
        .await;
    let id = invoice["id"].as_str().unwrap();

    let updated: Value = app
        .patch(
            &format!("/invoices/{}", id),
            &json!({ "customer_address": "2 Side St", "status": "paid" }),
        )
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(updated["customer_address"], "2 Side St");
    assert_eq!(updated["status"], "pending");
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);
    assert_eq!(money(&updated["total_amount"]), "20.00".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn replace_items_recomputes_total() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 2, "10.00")]))
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/invoices/{}/items", id),
            &json!({ "items": [
                { "description": "A", "quantity": 1, "unit_price": "0.10" },
                { "description": "B", "quantity": 3, "unit_price": "0.20" },
            ] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(money(&updated["total_amount"]), "0.70".parse::<Decimal>().unwrap());

    let response = app
        .put(&format!("/invoices/{}/items", id), &json!({ "items": [] }))
        .await;
    let emptied: Value = response.json().await.unwrap();
    assert_eq!(money(&emptied["total_amount"]), Decimal::ZERO);
    assert!(emptied["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_item_replacement_leaves_invoice_unchanged() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 2, "10.00")]))
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = app
        .put(
            &format!("/invoices/{}/items", id),
            &json!({ "items": [
                { "description": "A", "quantity": 1, "unit_price": "5.00" },
                { "description": "B", "quantity": 0, "unit_price": "5.00" },
            ] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let stored: Value = app.get(&format!("/invoices/{}", id)).await.json().await.unwrap();
    assert_eq!(stored["items"].as_array().unwrap().len(), 1);
    assert_eq!(money(&stored["total_amount"]), "20.00".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn delete_removes_invoice() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Widget", 1, "1.00")]))
        .await;
    let id = invoice["id"].as_str().unwrap();

    let response = app.delete(&format!("/invoices/{}", id)).await;
    assert_eq!(response.status().as_u16(), 204);

    let response = app.get(&format!("/invoices/{}", id)).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.delete(&format!("/invoices/{}", id)).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn amounts_are_returned_with_two_decimal_places() {
    let app = TestApp::spawn().await;
    let invoice = app
        .create_invoice(&invoice_body(&invoice_number(), &[("Washer", 3, "0.010")]))
        .await;

    assert_eq!(invoice["items"][0]["unit_price"], "0.01");
    assert_eq!(invoice["items"][0]["total_price"], "0.03");
    assert_eq!(invoice["total_amount"], "0.03");
}
