//! HTTP implementation of [`InstrumentApi`]
//!
//! Talks JSON to the bridge under `/api/*`. Non-2xx responses become
//! [`PanelError::HttpStatus`], except a `409` carrying `requiresConfirm`,
//! which becomes [`PanelError::ConfirmationRequired`].

use super::InstrumentApi;
use crate::error::{ConfirmReason, PanelError, Result};
use crate::types::{
    CalibrationImport, CalibrationImportReply, CalibrationRow, CalibrationTable, ComparisonReply,
    ConnectReply, Measurement, SavedMeasurement, Settings, SettingsUpdate, SingleReportReply,
    StatusReport, SystemInfo, WifiCredentials, WifiNetwork,
};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize)]
struct MeasurementsEnvelope {
    #[serde(default)]
    measurements: Vec<Measurement>,
}

#[derive(Deserialize)]
struct TestsEnvelope {
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Deserialize)]
struct NetworksEnvelope {
    #[serde(default)]
    networks: Vec<WifiNetwork>,
}

#[derive(Serialize)]
struct CalibrationBody<'a> {
    calibration: &'a [CalibrationRow],
}

#[derive(Serialize)]
struct GainBody {
    cell: usize,
    weight: f64,
}

#[derive(Serialize)]
struct NameBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
struct SerialBody<'a> {
    serial: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareBody<'a> {
    file_a: &'a str,
    file_b: &'a str,
}

#[derive(Serialize)]
struct SingleBody<'a> {
    file: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody {
    #[serde(default)]
    requires_confirm: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Bridge client over HTTP
#[derive(Debug, Clone)]
pub struct HttpInstrumentApi {
    client: Client,
    base: Url,
}

impl HttpInstrumentApi {
    /// Create a client for the bridge at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| PanelError::Config(format!("Invalid backend URL {:?}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Base URL all requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| PanelError::Config(format!("Invalid request path {:?}: {}", path, e)))
    }

    async fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::CONFLICT {
            if let Ok(body) = response.json::<ConfirmBody>().await {
                if body.requires_confirm {
                    return Err(PanelError::ConfirmationRequired {
                        reason: ConfirmReason::from_wire(body.reason.as_deref()),
                    });
                }
            }
        }
        Err(PanelError::HttpStatus {
            path: path.to_string(),
            status: status.as_u16(),
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<serde_json::Value>) -> Result<Response> {
        tracing::debug!("{} {}", method, path);
        let mut request = self.client.request(method, self.url(path)?);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Self::check(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.send(Method::GET, path, None).await?.json::<T>().await?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        Ok(self.send(Method::POST, path, Some(body)).await?.json::<T>().await?)
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        Ok(self.send(Method::PUT, path, Some(body)).await?.json::<T>().await?)
    }
}

#[async_trait]
impl InstrumentApi for HttpInstrumentApi {
    async fn health(&self) -> Result<()> {
        self.send(Method::GET, "/api/health", None).await?;
        Ok(())
    }

    async fn status(&self) -> Result<StatusReport> {
        self.get("/api/status").await
    }

    async fn measurements(&self) -> Result<Vec<Measurement>> {
        let envelope: MeasurementsEnvelope = self.get("/api/measurements").await?;
        Ok(envelope.measurements)
    }

    async fn save_measurement(&self, name: Option<String>) -> Result<SavedMeasurement> {
        self.post("/api/measurements", &NameBody { name }).await
    }

    async fn connect(&self) -> Result<ConnectReply> {
        self.post("/api/connect", &serde_json::json!({})).await
    }

    async fn disconnect(&self) -> Result<ConnectReply> {
        self.post("/api/disconnect", &serde_json::json!({})).await
    }

    async fn zero(&self) -> Result<()> {
        self.send(Method::POST, "/api/zero", Some(serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn calibration(&self) -> Result<Vec<CalibrationRow>> {
        let table: CalibrationTable = self.get("/api/calibration").await?;
        Ok(table.calibration)
    }

    async fn save_calibration(&self, rows: &[CalibrationRow]) -> Result<Vec<CalibrationRow>> {
        let table: CalibrationTable = self
            .put("/api/calibration", &CalibrationBody { calibration: rows })
            .await?;
        Ok(table.calibration)
    }

    async fn calibrate_zero(&self) -> Result<Vec<CalibrationRow>> {
        let table: CalibrationTable = self
            .post("/api/calibration/zero", &serde_json::json!({}))
            .await?;
        Ok(table.calibration)
    }

    async fn calibrate_gain(&self, cell: usize, weight: f64) -> Result<Vec<CalibrationRow>> {
        let table: CalibrationTable = self
            .post("/api/calibration/gain", &GainBody { cell, weight })
            .await?;
        Ok(table.calibration)
    }

    async fn import_calibration(
        &self,
        request: &CalibrationImport,
    ) -> Result<CalibrationImportReply> {
        self.post("/api/calibration/import", request).await
    }

    async fn export_calibration(&self) -> Result<String> {
        Ok(self
            .send(Method::GET, "/api/calibration/export", None)
            .await?
            .text()
            .await?)
    }

    async fn settings(&self) -> Result<Settings> {
        self.get("/api/settings").await
    }

    async fn save_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        self.put("/api/settings", update).await
    }

    async fn system_info(&self) -> Result<SystemInfo> {
        self.get("/api/system").await
    }

    async fn set_serial(&self, serial: &str) -> Result<SystemInfo> {
        self.put("/api/system/serial", &SerialBody { serial }).await
    }

    async fn set_system_wifi(&self, credentials: &WifiCredentials) -> Result<SystemInfo> {
        self.put("/api/system/wifi", credentials).await
    }

    async fn wifi_networks(&self) -> Result<Vec<WifiNetwork>> {
        let envelope: NetworksEnvelope = self.get("/api/wifi/networks").await?;
        Ok(envelope.networks)
    }

    async fn connect_wifi(&self, credentials: &WifiCredentials) -> Result<()> {
        self.send(
            Method::PUT,
            "/api/wifi/connect",
            Some(serde_json::to_value(credentials)?),
        )
        .await?;
        Ok(())
    }

    async fn saved_tests(&self) -> Result<Vec<String>> {
        let envelope: TestsEnvelope = self.get("/api/tests").await?;
        Ok(envelope.files)
    }

    async fn compare_reports(&self, file_a: &str, file_b: &str) -> Result<ComparisonReply> {
        self.post("/api/reports/compare", &CompareBody { file_a, file_b })
            .await
    }

    async fn single_report(&self, file: &str) -> Result<SingleReportReply> {
        self.post("/api/reports/single", &SingleBody { file }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let api = HttpInstrumentApi::new("http://127.0.0.1:8123/panel", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url().as_str(), "http://127.0.0.1:8123/panel/");
        assert_eq!(
            api.url("/api/status").unwrap().as_str(),
            "http://127.0.0.1:8123/panel/api/status"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpInstrumentApi::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, PanelError::Config(_)));
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(CompareBody {
            file_a: "a.csv",
            file_b: "b.csv",
        })
        .unwrap();
        assert_eq!(body["fileA"], "a.csv");
        assert_eq!(body["fileB"], "b.csv");

        let body = serde_json::to_value(NameBody { name: None }).unwrap();
        assert_eq!(body, serde_json::json!({}));

        let rows = [CalibrationRow::new(0, 1.5, 2.0)];
        let body = serde_json::to_value(CalibrationBody { calibration: &rows }).unwrap();
        assert_eq!(body["calibration"][0]["Gain"], "2");
    }

    #[test]
    fn test_confirm_body() {
        let body: ConfirmBody =
            serde_json::from_str(r#"{"error": "Serial mismatch", "requiresConfirm": true, "reason": "serial"}"#)
                .unwrap();
        assert!(body.requires_confirm);
        assert_eq!(
            ConfirmReason::from_wire(body.reason.as_deref()),
            ConfirmReason::SerialMismatch
        );
    }

    #[tokio::test]
    async fn test_unreachable_bridge_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments.
        let api = HttpInstrumentApi::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        let err = api.status().await.unwrap_err();
        assert!(err.is_transient());
    }
}
