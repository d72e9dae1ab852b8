//! Router tests driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use dental_core::Database;
use patient_service::{app, AppState};

fn test_app() -> Router {
    app(AppState::offline(Database::open_in_memory().unwrap()))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Doctor-Id", "doc-1")
        .header("X-Clinic-Id", "clinic-1");
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register_and_book(app: &Router) -> String {
    let (status, _) = call(
        app,
        Method::POST,
        "/patients",
        Some(json!({ "patientId": "pat-1", "name": "Ada Lovelace" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, appointment) = call(
        app,
        Method::POST,
        "/appointments",
        Some(json!({ "patientId": "pat-1", "date": "2026-03-01", "time": "10:30" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    appointment["appointmentId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (status, json) = call(&test_app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_doctor_header_is_401() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/consultation/appt-1")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = test_app();
    let (status, json) = call(
        &app,
        Method::POST,
        "/dental-chart/pat-1/check-conflict",
        Some(json!({ "toothNumber": 99, "surface": "occlusal" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_patient_chart_is_404() {
    let (status, json) = call(&test_app(), Method::GET, "/dental-chart/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_consultation_then_repeat_conflicts() {
    let app = test_app();
    let appointment_id = register_and_book(&app).await;

    let consultation = json!({
        "chiefComplaints": ["Sensitivity"],
        "performedTeeth": [{
            "toothNumber": 14,
            "procedures": [{
                "name": "Filling",
                "surface": "occlusal",
                "status": "completed",
                "cost": 500
            }]
        }]
    });
    let (status, outcome) = call(
        &app,
        Method::POST,
        &format!("/consultation/{appointment_id}"),
        Some(consultation),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let visit_id = outcome["visit"]["visitId"].as_str().unwrap().to_string();

    let (status, appointment) =
        call(&app, Method::GET, &format!("/appointments/{appointment_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appointment["status"], "completed");
    assert_eq!(appointment["visitId"], visit_id.as_str());

    let (status, tooth) = call(&app, Method::GET, "/dental-chart/pat-1/tooth/14", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tooth["procedures"][0]["cost"], 500.0);

    let (status, check) = call(
        &app,
        Method::POST,
        "/dental-chart/pat-1/check-conflict",
        Some(json!({ "toothNumber": 14, "surface": "mesial" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["hasConflict"], false);

    let (status, error) = call(
        &app,
        Method::POST,
        "/dental-chart/pat-1/procedure",
        Some(json!({
            "toothNumber": 14,
            "name": "Onlay",
            "surface": "occlusal",
            "status": "completed"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "SURFACE_ALREADY_TREATED");
    assert_eq!(error["error"]["details"]["toothNumber"], 14);
    assert_eq!(error["error"]["details"]["surface"], "occlusal");

    let (status, error) = call(
        &app,
        Method::POST,
        &format!("/consultation/{appointment_id}"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_plan_lifecycle() {
    let app = test_app();
    register_and_book(&app).await;

    let (status, plan) = call(
        &app,
        Method::POST,
        "/treatment-plan/pat-1/start",
        Some(json!({
            "planName": "Restore lower molar",
            "stages": [{ "stageName": "Endodontics" }, { "stageName": "Prosthetics" }],
            "teeth": [{
                "toothNumber": 30,
                "priority": "high",
                "procedures": [
                    { "name": "Root Canal", "surface": "entire", "stage": 1, "estimatedCost": 800 },
                    { "name": "Crown", "surface": "entire", "stage": 2, "estimatedCost": 1200 }
                ]
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["status"], "draft");
    let plan_id = plan["planId"].as_str().unwrap().to_string();

    let (status, plan) = call(
        &app,
        Method::POST,
        &format!("/treatment-plan/{plan_id}/stage/1/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["stages"][0]["status"], "completed");
    assert_eq!(plan["status"], "ongoing");
    assert_eq!(plan["currentStage"], 2);

    let (_, tooth) = call(&app, Method::GET, "/dental-chart/pat-1/tooth/30", None).await;
    let root_canal = tooth["procedures"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "Root Canal")
        .unwrap();
    assert_eq!(root_canal["status"], "completed");

    let (status, error) = call(
        &app,
        Method::DELETE,
        &format!("/treatment-plan/{plan_id}/stage/1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"]["code"], "INVALID_STATE");

    let (status, plan) = call(
        &app,
        Method::POST,
        &format!("/treatment-plan/{plan_id}/cancel"),
        Some(json!({ "reason": "Patient moved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["status"], "cancelled");

    let (status, plans) = call(&app, Method::GET, "/treatment-plan/patient/pat-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plans.as_array().unwrap().len(), 1);
}

fn tooth_entry<'a>(tooth: &'a Value, name: &str) -> &'a Value {
    tooth["procedures"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == name)
        .unwrap()
}

#[tokio::test]
async fn test_added_stage_completes_on_treated_tooth() {
    let app = test_app();
    register_and_book(&app).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/dental-chart/pat-1/procedure",
        Some(json!({
            "toothNumber": 14,
            "name": "Filling",
            "surface": "occlusal",
            "status": "completed"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, plan) = call(
        &app,
        Method::POST,
        "/treatment-plan/pat-1/start",
        Some(json!({
            "planName": "Bridge work",
            "stages": [{ "stageName": "Prep" }],
            "teeth": [{
                "toothNumber": 22,
                "procedures": [{
                    "name": "Crown",
                    "surface": "entire",
                    "stage": 1,
                    "estimatedCost": 900
                }]
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let plan_id = plan["planId"].as_str().unwrap().to_string();

    let (status, plan) = call(
        &app,
        Method::POST,
        &format!("/treatment-plan/{plan_id}/stage"),
        Some(json!({
            "stageName": "Crown 14",
            "toothSurfaceProcedures": [{
                "toothNumber": 14,
                "surfaceProcedures": [{ "surface": "entire", "procedureNames": ["Crown"] }]
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["stages"].as_array().unwrap().len(), 2);

    let (_, tooth) = call(&app, Method::GET, "/dental-chart/pat-1/tooth/14", None).await;
    assert_eq!(tooth_entry(&tooth, "Crown")["status"], "planned");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/treatment-plan/{plan_id}/stage/2/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, tooth) = call(&app, Method::GET, "/dental-chart/pat-1/tooth/14", None).await;
    assert_eq!(tooth_entry(&tooth, "Crown")["status"], "completed");

    let (status, plan) =
        call(&app, Method::POST, &format!("/treatment-plan/{plan_id}/finish"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["status"], "completed");
    let (_, tooth) = call(&app, Method::GET, "/dental-chart/pat-1/tooth/22", None).await;
    assert_eq!(tooth_entry(&tooth, "Crown")["status"], "completed");
}

#[tokio::test]
async fn test_cancel_clears_planned_chart_entries() {
    let app = test_app();
    register_and_book(&app).await;

    let (_, plan) = call(
        &app,
        Method::POST,
        "/treatment-plan/pat-1/start",
        Some(json!({
            "planName": "Crown",
            "stages": [{ "stageName": "Prep" }],
            "teeth": [{
                "toothNumber": 22,
                "procedures": [{ "name": "Crown", "surface": "entire", "stage": 1 }]
            }]
        })),
    )
    .await;
    let plan_id = plan["planId"].as_str().unwrap().to_string();

    let (status, _) =
        call(&app, Method::POST, &format!("/treatment-plan/{plan_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, tooth) = call(&app, Method::GET, "/dental-chart/pat-1/tooth/22", None).await;
    assert!(tooth["procedures"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.db");

    let app = app(AppState::offline(Database::open(&path).unwrap()));
    register_and_book(&app).await;
    drop(app);

    let app = patient_service::app(AppState::offline(Database::open(&path).unwrap()));
    let (status, patient) = call(&app, Method::GET, "/patients/pat-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patient["name"], "Ada Lovelace");
    assert_eq!(patient["clinicId"], "clinic-1");
}
