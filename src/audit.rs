use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::auth::load_credentials;
use crate::error::Result;
use crate::output::{self, SessionProgress};
use crate::providers::xnat::{DateRange, MismatchedScan, SessionTable, Verdict, XnatClient};

/// Inputs of one audit run.
#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub host: String,
    pub session_type: String,
    pub auth_file: PathBuf,
    pub range: DateRange,
}

/// A session with at least one scan labeled with another project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContaminatedSession {
    pub id: String,
    pub session_project: String,
    pub mismatched_scans: Vec<MismatchedScan>,
}

/// A session whose contamination status could not be decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndeterminedSession {
    pub id: String,
    pub reason: String,
}

/// Result of one audit run.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub range: DateRange,
    pub collected_at: DateTime<Utc>,
    pub total_sessions: usize,
    /// Listing rows of the contaminated sessions, in listing order.
    pub flagged: SessionTable,
    pub contaminated: Vec<ContaminatedSession>,
    pub undetermined: Vec<UndeterminedSession>,
}

/// Runs the audit end to end: credentials, listing, one check per session.
///
/// # Errors
///
/// Fails if the credentials cannot be loaded, the client cannot be built, or
/// the listing request fails. Failures while checking individual sessions do
/// not abort the run; see [`audit_sessions`].
pub async fn run(settings: &AuditSettings) -> Result<AuditReport> {
    let credentials = load_credentials(&settings.auth_file)?;
    let client = XnatClient::new(&settings.host, credentials, &settings.session_type)?;

    audit_sessions(&client, settings.range).await
}

/// Lists sessions in `range` and checks each one, strictly in listing order.
///
/// Issues one listing request followed by exactly one detail request per
/// listed session. A session whose check fails is recorded as undetermined and
/// the audit moves on.
///
/// # Errors
///
/// Fails only if the listing fails.
pub async fn audit_sessions(client: &XnatClient, range: DateRange) -> Result<AuditReport> {
    let sessions = client.list_sessions(&range).await?;
    println!("Total sessions: {}", sessions.len());

    let progress = SessionProgress::start(sessions.len());
    let mut contaminated = Vec::new();
    let mut undetermined = Vec::new();

    for id in sessions.ids() {
        let verdict = client.inspect_session(id).await.unwrap_or_else(|e| {
            warn!("Check of session {id} failed: {e}");
            Verdict::Undetermined {
                reason: e.to_string(),
            }
        });

        match verdict {
            Verdict::Clean => {}
            Verdict::Contaminated {
                session_project,
                mismatched_scans,
            } => {
                progress.println(&output::flagged_line(id));
                contaminated.push(ContaminatedSession {
                    id: id.to_string(),
                    session_project,
                    mismatched_scans,
                });
            }
            Verdict::Undetermined { reason } => {
                progress.println(&output::warning_line(id, &reason));
                undetermined.push(UndeterminedSession {
                    id: id.to_string(),
                    reason,
                });
            }
        }

        progress.advance();
    }

    progress.finish(contaminated.len());

    let flagged_ids: HashSet<String> = contaminated.iter().map(|s| s.id.clone()).collect();
    let flagged = sessions.retain_ids(&flagged_ids);

    info!(
        "Checked {} sessions: {} flagged, {} undetermined",
        sessions.len(),
        flagged.len(),
        undetermined.len()
    );

    Ok(AuditReport {
        range,
        collected_at: Utc::now(),
        total_sessions: sessions.len(),
        flagged,
        contaminated,
        undetermined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::error::AuditError;
    use crate::providers::xnat::MR_SESSION_TYPE;
    use chrono::NaiveDate;
    use mockito::{Matcher, Mock, ServerGuard};
    use std::io::Write;

    const LISTING: &str = "\
ID,project,label,date,xsiType,insert_date,URI
BU_CNC_E00301,TWCF,250501_S0101_TWCF_SES1,2025-05-01,xnat:mrSessionData,2025-05-01 10:02:11.0,/data/experiments/BU_CNC_E00301
BU_CNC_E00302,QA,250501_QA,2025-05-01,xnat:mrSessionData,2025-05-01 17:40:03.0,/data/experiments/BU_CNC_E00302
BU_CNC_E00303,TWCF,250502_S0102_TWCF_SES1,2025-05-02,xnat:mrSessionData,2025-05-02 09:15:45.0,/data/experiments/BU_CNC_E00303
BU_CNC_E00304,NIDA,\"250505_S0007_NIDA_SES2, repeat\",2025-05-05,xnat:mrSessionData,2025-05-05 12:00:00.0,/data/experiments/BU_CNC_E00304
BU_CNC_E00305,QA,250506_QA,2025-05-06,xnat:mrSessionData,2025-05-06 08:30:00.0,/data/experiments/BU_CNC_E00305
BU_CNC_E00306,NIDA,250507_S0009_NIDA_SES1,2025-05-07,xnat:mrSessionData,2025-05-07 16:20:31.0,/data/experiments/BU_CNC_E00306
";

    fn session_xml(project: &str, scan_projects: &[Option<&str>]) -> String {
        let scans: String = scan_projects
            .iter()
            .enumerate()
            .map(|(i, project)| match project {
                Some(p) => format!("<xnat:scan ID=\"{}\" project=\"{p}\"/>", i + 1),
                None => format!("<xnat:scan ID=\"{}\"/>", i + 1),
            })
            .collect();
        format!(
            "<xnat:MRSession project=\"{project}\" xmlns:xnat=\"http://nrg.wustl.edu/xnat\">\
             <xnat:scans>{scans}</xnat:scans></xnat:MRSession>"
        )
    }

    async fn mock_detail(server: &mut ServerGuard, id: &str, status: usize, body: &str) -> Mock {
        server
            .mock("GET", format!("/data/experiments/{id}").as_str())
            .match_query(Matcher::UrlEncoded("format".into(), "xml".into()))
            .with_status(status)
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    fn date(s: &str) -> Option<NaiveDate> {
        Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    #[tokio::test]
    async fn test_audit_week_of_sessions() {
        let mut server = mockito::Server::new_async().await;
        let listing = server
            .mock("GET", "/data/experiments")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("format".into(), "csv".into()),
                Matcher::UrlEncoded("date".into(), "05/01/2025-05/07/2025".into()),
            ]))
            .with_status(200)
            .with_body(LISTING)
            .expect(1)
            .create_async()
            .await;

        let details = vec![
            mock_detail(&mut server, "BU_CNC_E00301", 200, &session_xml("TWCF", &[Some("TWCF"), None])).await,
            mock_detail(&mut server, "BU_CNC_E00302", 200, &session_xml("QA", &[Some("QA")])).await,
            mock_detail(&mut server, "BU_CNC_E00303", 200, &session_xml("TWCF", &[Some("TWCF"), Some("Other")])).await,
            mock_detail(&mut server, "BU_CNC_E00304", 200, &session_xml("NIDA", &[Some("QA"), Some("NIDA")])).await,
            mock_detail(&mut server, "BU_CNC_E00305", 500, "").await,
            mock_detail(&mut server, "BU_CNC_E00306", 200, &session_xml("NIDA", &[])).await,
        ];

        let client =
            XnatClient::new(&server.url(), Credentials::new("u", "p"), MR_SESSION_TYPE).unwrap();
        let range = DateRange::new(date("2025-05-01"), date("2025-05-07"));

        let report = audit_sessions(&client, range).await.unwrap();

        listing.assert_async().await;
        for detail in &details {
            detail.assert_async().await;
        }

        assert_eq!(report.total_sessions, 6);
        assert_eq!(
            report.flagged.ids().collect::<Vec<_>>(),
            vec!["BU_CNC_E00303", "BU_CNC_E00304"]
        );

        let listed = SessionTable::from_csv(LISTING).unwrap();
        assert_eq!(report.flagged.headers(), listed.headers());
        assert_eq!(report.flagged.rows()[0], listed.rows()[2]);
        assert_eq!(report.flagged.rows()[1], listed.rows()[3]);

        assert_eq!(report.contaminated[1].session_project, "NIDA");
        assert_eq!(report.contaminated[1].mismatched_scans[0].project, "QA");
        assert_eq!(
            report.undetermined,
            vec![UndeterminedSession {
                id: "BU_CNC_E00305".to_string(),
                reason: "HTTP status 500".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_malformed_detail_does_not_abort_audit() {
        let mut server = mockito::Server::new_async().await;
        let _listing = server
            .mock("GET", "/data/experiments")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("ID,project\nE1,QA\nE2,QA\n")
            .create_async()
            .await;
        let _e1 = mock_detail(&mut server, "E1", 200, "<session project=\"QA\"><a></b></session>").await;
        let _e2 = mock_detail(&mut server, "E2", 200, &session_xml("QA", &[Some("TWCF")])).await;

        let client =
            XnatClient::new(&server.url(), Credentials::new("u", "p"), MR_SESSION_TYPE).unwrap();
        let report = audit_sessions(&client, DateRange::default()).await.unwrap();

        assert_eq!(report.flagged.ids().collect::<Vec<_>>(), vec!["E2"]);
        assert_eq!(report.undetermined.len(), 1);
        assert_eq!(report.undetermined[0].id, "E1");
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_audit() {
        let mut server = mockito::Server::new_async().await;
        let _listing = server
            .mock("GET", "/data/experiments")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client =
            XnatClient::new(&server.url(), Credentials::new("u", "p"), MR_SESSION_TYPE).unwrap();
        let err = audit_sessions(&client, DateRange::default()).await.unwrap_err();

        assert!(matches!(err, AuditError::Transport { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_run_requires_credentials_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let listing = server
            .mock("GET", "/data/experiments")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let settings = AuditSettings {
            host: server.url(),
            session_type: MR_SESSION_TYPE.to_string(),
            auth_file: dir.path().join(".xnat_auth"),
            range: DateRange::default(),
        };

        let err = run(&settings).await.unwrap_err();

        assert!(matches!(err, AuditError::ConfigNotFound(_)));
        listing.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_authenticates_with_loaded_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _listing = server
            .mock("GET", "/data/experiments")
            .match_query(Matcher::Any)
            // base64("qa:s3cret")
            .match_header("authorization", "Basic cWE6czNjcmV0")
            .with_status(200)
            .with_body("ID,project\n")
            .expect(1)
            .create_async()
            .await;

        let mut auth_file = tempfile::NamedTempFile::new().unwrap();
        write!(auth_file, "[auth]\nusername = qa\npassword = s3cret\n").unwrap();

        let settings = AuditSettings {
            host: server.url(),
            session_type: MR_SESSION_TYPE.to_string(),
            auth_file: auth_file.path().to_path_buf(),
            range: DateRange::default(),
        };

        let report = run(&settings).await.unwrap();
        assert_eq!(report.total_sessions, 0);
        assert!(report.flagged.is_empty());
    }
}
