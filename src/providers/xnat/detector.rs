use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use super::client::XnatClient;
use super::types::{MismatchedScan, Verdict};
use crate::error::{AuditError, Result};

/// Namespace of XNAT's experiment documents.
pub const XNAT_NAMESPACE: &str = "http://nrg.wustl.edu/xnat";

const SESSION_ELEMENT: &[u8] = b"MRSession";
const SCAN_ELEMENT: &[u8] = b"scan";

/// Decides whether a session document carries scans from another project.
///
/// The session project is the root element's `project` attribute, or, if the
/// root has none, that of the first nested `xnat:MRSession`. Every `xnat:scan`
/// carrying a `project` that differs from it is a mismatch; scans without a
/// `project` attribute are ignored. An empty session-level `project` counts as
/// absent.
///
/// Returns [`Verdict::Undetermined`] when no session project can be found.
///
/// # Errors
///
/// Returns [`AuditError::Parse`] if the document is not well-formed XML, has
/// no root element, is truncated before the root closes, or has more than one
/// top-level element.
pub fn evaluate_session_document(xml: &str) -> Result<Verdict> {
    let mut reader = NsReader::from_str(xml);

    let mut root_project: Option<Option<String>> = None;
    let mut nested_project: Option<String> = None;
    let mut scans: Vec<(Option<String>, String)> = Vec::new();

    // Open elements; the document must end with the root closed.
    let mut depth = 0usize;
    let mut root_closed = false;

    loop {
        let (ns, element, opens) = match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) => (ns, e, true),
            Ok((ns, Event::Empty(e))) => (ns, e, false),
            Ok((_, Event::End(_))) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AuditError::parse("session XML", "unexpected end tag"))?;
                root_closed = depth == 0;
                continue;
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => continue,
            Err(e) => return Err(AuditError::parse("session XML", e)),
        };

        if root_closed {
            return Err(AuditError::parse(
                "session XML",
                "element after the root element",
            ));
        }
        if opens {
            depth += 1;
        } else if depth == 0 {
            root_closed = true;
        }

        let project = attribute(&element, b"project")?;

        if root_project.is_none() {
            root_project = Some(project.filter(|p| !p.is_empty()));
            continue;
        }

        if !is_xnat(&ns) {
            continue;
        }

        match element.local_name().as_ref() {
            SESSION_ELEMENT if matches!(root_project, Some(None)) && nested_project.is_none() => {
                nested_project = project.filter(|p| !p.is_empty());
            }
            SCAN_ELEMENT => {
                if let Some(project) = project {
                    scans.push((attribute(&element, b"ID")?, project));
                }
            }
            _ => {}
        }
    }

    let Some(root_project) = root_project else {
        return Err(AuditError::parse("session XML", "document has no root element"));
    };
    if depth != 0 {
        return Err(AuditError::parse(
            "session XML",
            "document ends before the root element is closed",
        ));
    }

    let Some(session_project) = root_project.or(nested_project) else {
        return Ok(Verdict::Undetermined {
            reason: "no project attribute found".to_string(),
        });
    };

    let mismatched_scans: Vec<_> = scans
        .into_iter()
        .filter(|(_, project)| *project != session_project)
        .map(|(scan_id, project)| MismatchedScan { scan_id, project })
        .collect();

    if mismatched_scans.is_empty() {
        Ok(Verdict::Clean)
    } else {
        Ok(Verdict::Contaminated {
            session_project,
            mismatched_scans,
        })
    }
}

fn is_xnat(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == XNAT_NAMESPACE.as_bytes())
}

/// Value of the unprefixed attribute `name`, unescaped.
fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| AuditError::parse("session XML", e))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| AuditError::parse("session XML", e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

impl XnatClient {
    /// Fetches one session's XML document and evaluates it.
    ///
    /// A non-success status yields [`Verdict::Undetermined`] rather than an
    /// error so that a single unreadable session does not end the audit.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Network`] if the request cannot be sent and
    /// [`AuditError::Parse`] if the document is malformed.
    pub async fn inspect_session(&self, session_id: &str) -> Result<Verdict> {
        let mut url = self.experiments_url(&[session_id]);
        url.query_pairs_mut().append_pair("format", "xml");
        debug!("GET {url}");

        let response = self.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Could not fetch session XML for {session_id} (status: {status})");
            return Ok(Verdict::Undetermined {
                reason: format!("HTTP status {}", status.as_u16()),
            });
        }

        let body = response.text().await?;
        let verdict = evaluate_session_document(&body)?;

        if let Verdict::Undetermined { reason } = &verdict {
            warn!("Session {session_id}: {reason}");
        }

        Ok(verdict)
    }

    /// Returns `true` iff the session has at least one scan labeled with a
    /// different project. Undetermined sessions count as clean.
    #[allow(dead_code)]
    pub async fn is_contaminated(&self, session_id: &str) -> Result<bool> {
        Ok(self.inspect_session(session_id).await?.is_contaminated())
    }
}
