//! Alert service — read and create access to the alert catalogue.
//!
//! Alerts are immutable once created: there is no update or delete path.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use sentinel_common::error::AppError;
use sentinel_common::types::{Alert, Severity};

/// Service layer for the alert catalogue.
pub struct AlertService;

/// Parameters for creating a new alert.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateAlertParams {
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub description: String,
    pub eta: Option<String>,
    pub distance: Option<String>,
    pub confidence: Option<i32>,
    pub affected_population: Option<String>,
    #[serde(default)]
    pub evacuation_zones: Vec<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub ai_prediction: bool,
}

impl CreateAlertParams {
    fn validate(&self) -> Result<Severity, AppError> {
        let severity: Severity = self.severity.parse().map_err(AppError::Validation)?;

        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::Validation(
                "description must not be empty".to_string(),
            ));
        }
        if self.alert_type.trim().is_empty() {
            return Err(AppError::Validation(
                "alert_type must not be empty".to_string(),
            ));
        }
        if let Some(confidence) = self.confidence
            && !(0..=100).contains(&confidence)
        {
            return Err(AppError::Validation(format!(
                "confidence must be between 0 and 100, got {}",
                confidence
            )));
        }

        Ok(severity)
    }
}

impl AlertService {
    pub async fn create(pool: &PgPool, params: &CreateAlertParams) -> Result<Alert, AppError> {
        let severity = params.validate()?;

        let alert: Alert = sqlx::query_as(
            r#"
            INSERT INTO alerts (id, alert_type, severity, title, description, eta, distance,
                                confidence, affected_population, evacuation_zones, source,
                                ai_prediction, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.alert_type.trim())
        .bind(severity.to_string())
        .bind(params.title.trim())
        .bind(params.description.trim())
        .bind(&params.eta)
        .bind(&params.distance)
        .bind(params.confidence)
        .bind(&params.affected_population)
        .bind(&params.evacuation_zones)
        .bind(&params.source)
        .bind(params.ai_prediction)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        tracing::info!(
            alert_id = %alert.id,
            severity = %alert.severity,
            alert_type = %alert.alert_type,
            "Alert created"
        );

        Ok(alert)
    }

    /// All alerts, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Alert>, AppError> {
        let alerts: Vec<Alert> = sqlx::query_as("SELECT * FROM alerts ORDER BY timestamp DESC")
            .fetch_all(pool)
            .await?;

        Ok(alerts)
    }

    pub async fn get(pool: &PgPool, alert_id: Uuid) -> Result<Alert, AppError> {
        let alert: Alert = sqlx::query_as("SELECT * FROM alerts WHERE id = $1")
            .bind(alert_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", alert_id)))?;

        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CreateAlertParams {
        CreateAlertParams {
            alert_type: "flood".to_string(),
            severity: "critical".to_string(),
            title: "Flood Warning".to_string(),
            description: "River levels rising".to_string(),
            eta: Some("30 min".to_string()),
            distance: None,
            confidence: Some(92),
            affected_population: None,
            evacuation_zones: Vec::new(),
            source: None,
            ai_prediction: false,
        }
    }

    #[test]
    fn test_valid_params() {
        assert_eq!(params().validate().unwrap(), Severity::Critical);
    }

    #[test]
    fn test_unknown_severity_rejected() {
        let p = CreateAlertParams {
            severity: "apocalyptic".to_string(),
            ..params()
        };
        assert!(matches!(p.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let p = CreateAlertParams {
            confidence: Some(101),
            ..params()
        };
        assert!(matches!(p.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_blank_title_rejected() {
        let p = CreateAlertParams {
            title: "  ".to_string(),
            ..params()
        };
        assert!(matches!(p.validate(), Err(AppError::Validation(_))));
    }
}
