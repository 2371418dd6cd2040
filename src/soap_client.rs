//! MantisConnect SOAP client.
//!
//! This module provides [`SoapClient`], which runs the remote procedure
//! catalogue over a [`Transport`], and [`CallContext`], the per-call
//! cancellation token and tracing span every operation takes.
//!
//! Each call encodes into its own buffer and follows the phases
//! `Idle -> Encoding -> Sent -> Decoding -> Done` (or `Failed`). Retries
//! belong to the transport; the client never repeats a call.
//!
//! # Security
//!
//! The password is only ever written into request envelopes. It is never
//! logged.

use std::collections::HashSet;
use std::io::Read;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::codec::attachment::write_base64_element;
use crate::config::Config;
use crate::envelope::{decode_response, CallPhase, CallState, Credentials, Envelope};
use crate::error::MantisError;
use crate::models::{
    AccountData, FilterData, FilterSearchData, IssueData, IssueNoteData, ObjectRef, ProjectData,
    ProjectVersionData, UserData,
};
use crate::requests::{
    EnumStatus, FilterGet, FilterGetIssues, FilterSearchIssues, IssueAdd, IssueAttachmentAdd,
    IssueDelete, IssueExists, IssueGet, IssueGetBiggestId, IssueNoteAdd, IssueUpdate, Login,
    ProjectGetIssues, ProjectGetUsers, ProjectGetVersions, ProjectVersionAdd,
    ProjectVersionDelete, ProjectVersionUpdate, ProjectsGetUserAccessible, SoapRequest, Version,
};
use crate::transport::{HttpTransport, Transport};
use crate::xml::FromXml;

/// Element name of the streamed attachment content.
const CONTENT_TAG: &str = "content";

/// Per-call context: cancellation and the span the call logs under.
///
/// Cloning shares the token, so cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    span: Span,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// Creates a context with a fresh token, logging under the current span.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// Uses an existing cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Logs the call under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// A context cancelled together with this one, but not vice versa.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            span: self.span.clone(),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Requests cancellation of every call using this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Pre-flight check.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Cancelled` if the context is already cancelled.
    pub fn check(&self) -> Result<(), MantisError> {
        if self.is_cancelled() {
            return Err(MantisError::Cancelled);
        }
        Ok(())
    }
}

/// Result of [`SoapClient::issue_add_monitors`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorUpdate {
    /// Monitors after the update.
    pub monitors: Vec<AccountData>,
    /// Names that were added.
    pub added: Vec<String>,
    /// Names that matched no project user.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<String>,
}

/// What [`SoapClient::issue_set_status`] did to one issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StatusChange {
    /// The issue was already at or past the target status.
    Skipped { issue_id: u64, status: ObjectRef },
    /// The issue was moved to the target status.
    Updated { issue_id: u64, status_id: u64 },
}

/// Client for the MantisConnect SOAP API.
///
/// Holds no per-call state, so a client can be shared (or cloned) across
/// concurrent calls.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let ctx = CallContext::new();
/// let client = SoapClient::connect(&config, &ctx).await?;
///
/// let issue = client.issue_get(&ctx, 1000).await?;
/// println!("{}", issue.summary.unwrap_or_default());
/// ```
#[derive(Clone)]
pub struct SoapClient<T = HttpTransport> {
    transport: T,
    credentials: Credentials,
    /// Account of the logged-in user, once `login` succeeded.
    user: Option<AccountData>,
}

impl SoapClient<HttpTransport> {
    /// Creates an HTTP client from configuration, without logging in.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, MantisError> {
        Ok(Self::with_transport(
            HttpTransport::new(config)?,
            config.credentials(),
        ))
    }

    /// Creates an HTTP client and logs in.
    ///
    /// # Errors
    ///
    /// Returns any error from [`new`](Self::new) or [`login`](Self::login).
    pub async fn connect(config: &Config, ctx: &CallContext) -> Result<Self, MantisError> {
        let mut client = Self::new(config)?;
        client.login(ctx).await?;
        Ok(client)
    }
}

impl<T: Transport> SoapClient<T> {
    /// Creates a client over any transport.
    pub fn with_transport(transport: T, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
            user: None,
        }
    }

    /// The logged-in user's account, if `login` has been called.
    pub fn user(&self) -> Option<&AccountData> {
        self.user.as_ref()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one remote call.
    ///
    /// # Errors
    ///
    /// - `MantisError::Cancelled` if `ctx` is cancelled before or during the call
    /// - `MantisError::Marshal` if a parameter cannot be written
    /// - transport errors, unchanged
    /// - `MantisError::Fault` / `MantisError::Decode` / codec errors from the response
    pub async fn call<R: SoapRequest>(
        &self,
        ctx: &CallContext,
        request: &R,
    ) -> Result<R::Output, MantisError> {
        async {
            let mut state = CallState::new(R::OPERATION);
            ctx.check().map_err(|e| state.fail(e))?;

            state.advance(CallPhase::Encoding);
            let payload = self
                .open(request)
                .and_then(Envelope::finish)
                .map_err(|e| state.fail(e))?;

            self.exchange(ctx, &mut state, R::OPERATION, payload).await
        }
        .instrument(ctx.span.clone())
        .await
    }

    /// Opens an envelope and writes the request's parameters.
    fn open<R: SoapRequest>(&self, request: &R) -> Result<Envelope, MantisError> {
        let credentials = R::AUTHENTICATED.then_some(&self.credentials);
        let mut envelope = Envelope::begin(R::OPERATION, credentials)?;
        request.write_params(envelope.writer())?;
        Ok(envelope)
    }

    /// Sends an encoded payload and decodes the response, racing the
    /// transport against cancellation.
    async fn exchange<O: FromXml>(
        &self,
        ctx: &CallContext,
        state: &mut CallState,
        operation: &'static str,
        payload: Vec<u8>,
    ) -> Result<O, MantisError> {
        state.advance(CallPhase::Sent);
        let body = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(state.fail(MantisError::Cancelled)),
            result = self.transport.call(operation, payload) => {
                result.map_err(|e| state.fail(e))?
            }
        };

        state.advance(CallPhase::Decoding);
        let value = decode_response(operation, &body).map_err(|e| state.fail(e))?;
        state.advance(CallPhase::Done);
        Ok(value)
    }

    /// Validates the credentials and remembers the user's account.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Fault` if the server rejects the credentials.
    pub async fn login(&mut self, ctx: &CallContext) -> Result<UserData, MantisError> {
        let user = self.call(ctx, &Login).await?;
        tracing::info!(
            user = user.account_data.name.as_deref().unwrap_or_default(),
            "Logged in to Mantis"
        );
        self.user = Some(user.account_data.clone());
        Ok(user)
    }

    /// Returns the server's MantisBT version. Needs no credentials.
    pub async fn version(&self, ctx: &CallContext) -> Result<String, MantisError> {
        self.call(ctx, &Version).await
    }

    pub async fn issue_exists(&self, ctx: &CallContext, issue_id: u64) -> Result<bool, MantisError> {
        self.call(ctx, &IssueExists { issue_id }).await
    }

    /// Gets full details of a single issue.
    ///
    /// # Errors
    ///
    /// Returns `MantisError::Fault` if the issue does not exist or is not
    /// visible to the user.
    pub async fn issue_get(&self, ctx: &CallContext, issue_id: u64) -> Result<IssueData, MantisError> {
        self.call(ctx, &IssueGet { issue_id }).await
    }

    /// Returns the highest issue ID in a project (0 for all projects).
    pub async fn issue_get_biggest_id(
        &self,
        ctx: &CallContext,
        project_id: u64,
    ) -> Result<u64, MantisError> {
        self.call(ctx, &IssueGetBiggestId { project_id }).await
    }

    /// Creates an issue and returns its ID.
    pub async fn issue_add(&self, ctx: &CallContext, issue: IssueData) -> Result<u64, MantisError> {
        self.call(ctx, &IssueAdd { issue }).await
    }

    /// Replaces an issue. `issue.id` is set to `issue_id` before sending.
    pub async fn issue_update(
        &self,
        ctx: &CallContext,
        issue_id: u64,
        mut issue: IssueData,
    ) -> Result<bool, MantisError> {
        issue.id = Some(issue_id);
        self.call(ctx, &IssueUpdate { issue_id, issue }).await
    }

    pub async fn issue_delete(&self, ctx: &CallContext, issue_id: u64) -> Result<bool, MantisError> {
        self.call(ctx, &IssueDelete { issue_id }).await
    }

    /// Adds a note to an issue and returns the note's ID.
    pub async fn issue_note_add(
        &self,
        ctx: &CallContext,
        issue_id: u64,
        note: IssueNoteData,
    ) -> Result<u64, MantisError> {
        self.call(ctx, &IssueNoteAdd { issue_id, note }).await
    }

    /// Uploads an attachment, streaming `content` as base64 into the request.
    ///
    /// # Arguments
    ///
    /// * `issue_id` - Issue to attach to
    /// * `name` - File name shown in the issue
    /// * `file_type` - MIME type
    /// * `content` - Any blocking byte source, typically a `File`
    ///
    /// # Errors
    ///
    /// - `MantisError::Attachment` if reading `content` fails
    /// - `MantisError::Cancelled` if `ctx` is cancelled while encoding or sending
    /// - any error [`call`](Self::call) can return
    pub async fn issue_attachment_add<R>(
        &self,
        ctx: &CallContext,
        issue_id: u64,
        name: impl Into<String>,
        file_type: impl Into<String>,
        content: R,
    ) -> Result<u64, MantisError>
    where
        R: Read + Send + 'static,
    {
        let request = IssueAttachmentAdd {
            issue_id,
            name: name.into(),
            file_type: file_type.into(),
        };

        async {
            let operation = IssueAttachmentAdd::OPERATION;
            let mut state = CallState::new(operation);
            ctx.check().map_err(|e| state.fail(e))?;

            state.advance(CallPhase::Encoding);
            let mut envelope = self.open(&request).map_err(|e| state.fail(e))?;
            write_base64_element(envelope.writer(), CONTENT_TAG, content, &ctx.cancel)
                .await
                .map_err(|e| state.fail(e))?;
            let payload = envelope.finish().map_err(|e| state.fail(e))?;
            tracing::debug!(
                issue_id,
                name = %request.name,
                bytes = payload.len(),
                "Attachment envelope encoded"
            );

            self.exchange(ctx, &mut state, operation, payload).await
        }
        .instrument(ctx.span.clone())
        .await
    }

    /// Lists users with at least `access` level on a project.
    pub async fn project_get_users(
        &self,
        ctx: &CallContext,
        project_id: u64,
        access: u64,
    ) -> Result<Vec<AccountData>, MantisError> {
        self.call(ctx, &ProjectGetUsers { project_id, access }).await
    }

    /// Lists projects (with subprojects) the user can access.
    pub async fn projects_get_user_accessible(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<ProjectData>, MantisError> {
        self.call(ctx, &ProjectsGetUserAccessible).await
    }

    /// Gets one page of a project's issues. Pages are 1-based.
    pub async fn project_get_issues(
        &self,
        ctx: &CallContext,
        project_id: u64,
        page_number: u64,
        per_page: u64,
    ) -> Result<Vec<IssueData>, MantisError> {
        self.call(
            ctx,
            &ProjectGetIssues {
                project_id,
                page_number,
                per_page,
            },
        )
        .await
    }

    pub async fn project_versions_list(
        &self,
        ctx: &CallContext,
        project_id: u64,
    ) -> Result<Vec<ProjectVersionData>, MantisError> {
        self.call(ctx, &ProjectGetVersions { project_id }).await
    }

    /// Creates a version and returns its ID.
    pub async fn project_version_add(
        &self,
        ctx: &CallContext,
        version: ProjectVersionData,
    ) -> Result<u64, MantisError> {
        self.call(ctx, &ProjectVersionAdd { version }).await
    }

    /// Replaces a version. `version.id` is set to `version_id` before sending.
    pub async fn project_version_update(
        &self,
        ctx: &CallContext,
        version_id: u64,
        mut version: ProjectVersionData,
    ) -> Result<bool, MantisError> {
        version.id = Some(version_id);
        self.call(ctx, &ProjectVersionUpdate { version_id, version })
            .await
    }

    pub async fn project_version_delete(
        &self,
        ctx: &CallContext,
        version_id: u64,
    ) -> Result<bool, MantisError> {
        self.call(ctx, &ProjectVersionDelete { version_id }).await
    }

    /// Finds a version by ID across every accessible project.
    ///
    /// Versions are only listed per project, so this walks the project tree.
    pub async fn project_version_find(
        &self,
        ctx: &CallContext,
        version_id: u64,
    ) -> Result<Option<ProjectVersionData>, MantisError> {
        let projects = self.projects_get_user_accessible(ctx).await?;
        for project in projects.iter().flat_map(ProjectData::flatten) {
            let Some(project_id) = project.id else {
                continue;
            };
            let versions = self.project_versions_list(ctx, project_id).await?;
            if let Some(version) = versions.into_iter().find(|v| v.id == Some(version_id)) {
                return Ok(Some(version));
            }
        }
        Ok(None)
    }

    /// Lists stored filters for a project (0 for all projects).
    pub async fn filter_get(
        &self,
        ctx: &CallContext,
        project_id: u64,
    ) -> Result<Vec<FilterData>, MantisError> {
        self.call(ctx, &FilterGet { project_id }).await
    }

    /// Gets one page of issues matching a stored filter.
    pub async fn filter_get_issues(
        &self,
        ctx: &CallContext,
        project_id: u64,
        filter_id: u64,
        page_number: u64,
        per_page: u64,
    ) -> Result<Vec<IssueData>, MantisError> {
        self.call(
            ctx,
            &FilterGetIssues {
                project_id,
                filter_id,
                page_number,
                per_page,
            },
        )
        .await
    }

    /// Gets one page of issues matching ad-hoc criteria.
    pub async fn filter_search_issues(
        &self,
        ctx: &CallContext,
        filter: FilterSearchData,
        page_number: u64,
        per_page: u64,
    ) -> Result<Vec<IssueData>, MantisError> {
        self.call(
            ctx,
            &FilterSearchIssues {
                filter,
                page_number,
                per_page,
            },
        )
        .await
    }

    /// Lists the configured issue statuses.
    pub async fn enum_status(&self, ctx: &CallContext) -> Result<Vec<ObjectRef>, MantisError> {
        self.call(ctx, &EnumStatus).await
    }

    /// Adds users (by login name) as monitors of an issue.
    ///
    /// Names are resolved against the users of the issue's project. Names
    /// already monitoring are skipped, unknown names are reported back. The
    /// issue is updated once, and only if something was added; custom fields,
    /// attachments and notes are left out of that update.
    pub async fn issue_add_monitors(
        &self,
        ctx: &CallContext,
        issue_id: u64,
        names: &[String],
    ) -> Result<MonitorUpdate, MantisError> {
        let mut issue = self.issue_get(ctx, issue_id).await?;
        let project_id = issue.project.as_ref().and_then(|p| p.id).unwrap_or(0);
        let users = self.project_get_users(ctx, project_id, 0).await?;

        let mut present: HashSet<String> =
            issue.monitors.iter().filter_map(|m| m.name.clone()).collect();
        let mut update = MonitorUpdate::default();

        for name in names {
            if present.contains(name) {
                continue;
            }
            match users.iter().find(|u| u.name.as_deref() == Some(name.as_str())) {
                Some(user) => {
                    issue.monitors.push(user.clone());
                    present.insert(name.clone());
                    update.added.push(name.clone());
                }
                None => {
                    tracing::info!(issue_id, user = %name, "Unknown user, not added as monitor");
                    update.unknown.push(name.clone());
                }
            }
        }

        if !update.added.is_empty() {
            issue.custom_fields.clear();
            issue.attachments.clear();
            issue.notes.clear();
            self.issue_update(ctx, issue_id, issue.clone()).await?;
        }
        update.monitors = issue.monitors;
        Ok(update)
    }

    /// Raises the status of each issue to `status_id`.
    ///
    /// Issues already at or past `status_id` are skipped. Custom fields with
    /// empty values are dropped before the update, since the server rejects
    /// them for required fields.
    pub async fn issue_set_status(
        &self,
        ctx: &CallContext,
        status_id: u64,
        issue_ids: &[u64],
    ) -> Result<Vec<StatusChange>, MantisError> {
        let mut changes = Vec::with_capacity(issue_ids.len());
        for &issue_id in issue_ids {
            ctx.check()?;
            let mut issue = self.issue_get(ctx, issue_id).await?;
            if issue.status_id() >= status_id {
                let status = issue.status.clone().unwrap_or_default();
                tracing::info!(
                    issue_id,
                    current = issue.status_id(),
                    target = status_id,
                    "Status already reached, skipping"
                );
                changes.push(StatusChange::Skipped { issue_id, status });
                continue;
            }

            issue.status = Some(ObjectRef::with_id(status_id));
            issue.custom_fields.retain(|f| !f.is_empty());
            self.issue_update(ctx, issue_id, issue).await?;
            changes.push(StatusChange::Updated { issue_id, status_id });
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::NAMESPACE;
    use crate::models::CustomFieldValue;
    use crate::xml::XmlNode;
    use base64::Engine;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct MockState {
        responses: VecDeque<Result<String, MantisError>>,
        requests: Vec<(String, String)>,
    }

    /// Replays queued responses; pends forever once the queue is empty.
    #[derive(Clone, Default)]
    struct MockTransport {
        state: Arc<Mutex<MockState>>,
    }

    impl MockTransport {
        fn respond(&self, operation: &str, inner: &str) -> &Self {
            let body = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ns1="{}"><SOAP-ENV:Body><ns1:{}Response>{}</ns1:{}Response></SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
                NAMESPACE, operation, inner, operation
            );
            self.state.lock().unwrap().responses.push_back(Ok(body));
            self
        }

        fn fail(&self, error: MantisError) -> &Self {
            self.state.lock().unwrap().responses.push_back(Err(error));
            self
        }

        fn requests(&self) -> Vec<(String, String)> {
            self.state.lock().unwrap().requests.clone()
        }

        fn request_body(&self, index: usize) -> XmlNode {
            XmlNode::parse(&self.requests()[index].1).unwrap()
        }
    }

    impl Transport for MockTransport {
        async fn call(&self, operation: &str, payload: Vec<u8>) -> Result<String, MantisError> {
            let next = {
                let mut state = self.state.lock().unwrap();
                state
                    .requests
                    .push((operation.to_string(), String::from_utf8(payload).unwrap()));
                state.responses.pop_front()
            };
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn client(transport: &MockTransport) -> SoapClient<MockTransport> {
        SoapClient::with_transport(transport.clone(), Credentials::new("admin", "s3cret"))
    }

    fn issue_xml(id: u64, status: u64, extra: &str) -> String {
        format!(
            "<return><id>{}</id><project><id>1</id><name>kobe</name></project>\
             <status><id>{}</id><name>s{}</name></status>{}</return>",
            id, status, status, extra
        )
    }

    #[tokio::test]
    async fn test_login_stores_user_and_sends_credentials() {
        let transport = MockTransport::default();
        transport.respond(
            "mc_login",
            "<return><account_data><id>3</id><name>admin</name></account_data>\
             <access_level>90</access_level></return>",
        );

        let mut client = client(&transport);
        let user = client.login(&CallContext::new()).await.unwrap();

        assert_eq!(user.access_level, Some(90));
        assert_eq!(client.user().unwrap().id, Some(3));
        let sent = transport.request_body(0);
        let op = sent.find("mc_login").unwrap();
        assert_eq!(op.child("username").unwrap().text, "admin");
        assert_eq!(op.child("password").unwrap().text, "s3cret");
    }

    #[tokio::test]
    async fn test_version_sends_no_credentials() {
        let transport = MockTransport::default();
        transport.respond("mc_version", "<return>1.2.19</return>");

        let version = client(&transport).version(&CallContext::new()).await.unwrap();
        assert_eq!(version, "1.2.19");
        assert!(!transport.requests()[0].1.contains("password"));
    }

    #[test]
    fn test_precancelled_call_sends_nothing() {
        let transport = MockTransport::default();
        let ctx = CallContext::new();
        ctx.cancel();

        let err = tokio_test::block_on(client(&transport).issue_get(&ctx, 1)).unwrap_err();
        assert!(matches!(err, MantisError::Cancelled));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_transport() {
        let transport = MockTransport::default();
        let client = client(&transport);
        let ctx = CallContext::new();

        let canceller = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                ctx.cancel();
            })
        };

        let result = tokio::time::timeout(Duration::from_secs(5), client.issue_exists(&ctx, 1))
            .await
            .expect("cancellation should unblock the call");
        assert!(matches!(result, Err(MantisError::Cancelled)));
        assert_eq!(transport.requests().len(), 1);
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let transport = MockTransport::default();
        transport.fail(MantisError::Authentication);

        let err = client(&transport)
            .issue_exists(&CallContext::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MantisError::Authentication));
    }

    #[tokio::test]
    async fn test_fault_propagates() {
        let transport = MockTransport::default();
        let fault = r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/"><SOAP-ENV:Body><SOAP-ENV:Fault><faultcode>Client</faultcode><faultstring>Issue #9 not found.</faultstring></SOAP-ENV:Fault></SOAP-ENV:Body></SOAP-ENV:Envelope>"#;
        transport.state.lock().unwrap().responses.push_back(Ok(fault.to_string()));

        let err = client(&transport).issue_get(&CallContext::new(), 9).await.unwrap_err();
        assert!(matches!(err, MantisError::Fault { ref message, .. } if message.contains("#9")));
    }

    #[tokio::test]
    async fn test_issue_update_sets_id() {
        let transport = MockTransport::default();
        transport.respond("mc_issue_update", "<return>true</return>");

        let issue = IssueData {
            id: Some(1),
            summary: Some("moved".to_string()),
            ..Default::default()
        };
        let updated = client(&transport)
            .issue_update(&CallContext::new(), 77, issue)
            .await
            .unwrap();

        assert!(updated);
        let sent = transport.request_body(0);
        let op = sent.find("mc_issue_update").unwrap();
        assert_eq!(op.child("issueId").unwrap().text, "77");
        assert_eq!(op.child("issue").unwrap().child("id").unwrap().text, "77");
    }

    #[tokio::test]
    async fn test_attachment_add_streams_content() {
        let transport = MockTransport::default();
        transport.respond("mc_issue_attachment_add", "<return>55</return>");

        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let id = client(&transport)
            .issue_attachment_add(
                &CallContext::new(),
                12,
                "data.bin",
                "application/octet-stream",
                std::io::Cursor::new(content.clone()),
            )
            .await
            .unwrap();

        assert_eq!(id, 55);
        let sent = transport.request_body(0);
        let op = sent.find("mc_issue_attachment_add").unwrap();
        assert_eq!(op.child("name").unwrap().text, "data.bin");
        let encoded = &op.child("content").unwrap().text;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(decoded, content);
    }

    #[tokio::test]
    async fn test_attachment_add_source_error_sends_nothing() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk on fire"))
            }
        }

        let transport = MockTransport::default();
        let err = client(&transport)
            .issue_attachment_add(&CallContext::new(), 1, "x", "text/plain", Broken)
            .await
            .unwrap_err();
        assert!(matches!(err, MantisError::Attachment(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_add_monitors_resolves_and_updates_once() {
        let transport = MockTransport::default();
        transport
            .respond(
                "mc_issue_get",
                &issue_xml(
                    5,
                    10,
                    "<monitors><item><id>2</id><name>jdoe</name></item></monitors>\
                     <notes><item><id>1</id><text>n</text></item></notes>",
                ),
            )
            .respond(
                "mc_project_get_users",
                "<return><item><id>2</id><name>jdoe</name></item>\
                 <item><id>4</id><name>ann</name></item></return>",
            )
            .respond("mc_issue_update", "<return>true</return>");

        let names = vec!["jdoe".to_string(), "ann".to_string(), "ghost".to_string()];
        let update = client(&transport)
            .issue_add_monitors(&CallContext::new(), 5, &names)
            .await
            .unwrap();

        assert_eq!(update.added, vec!["ann".to_string()]);
        assert_eq!(update.unknown, vec!["ghost".to_string()]);
        assert_eq!(update.monitors.len(), 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].0, "mc_issue_update");
        let sent = transport.request_body(2);
        let issue = sent.find("issue").unwrap();
        assert!(issue.child("notes").is_none());
        assert_eq!(issue.child("monitors").unwrap().children.len(), 2);
        let users_request = transport.request_body(1);
        assert_eq!(users_request.find("project_id").unwrap().text, "1");
    }

    #[tokio::test]
    async fn test_add_monitors_without_changes_skips_update() {
        let transport = MockTransport::default();
        transport
            .respond(
                "mc_issue_get",
                &issue_xml(5, 10, "<monitors><item><name>jdoe</name></item></monitors>"),
            )
            .respond("mc_project_get_users", "<return/>");

        let update = client(&transport)
            .issue_add_monitors(&CallContext::new(), 5, &["jdoe".to_string()])
            .await
            .unwrap();
        assert!(update.added.is_empty());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_set_status_skips_and_updates() {
        let transport = MockTransport::default();
        transport
            .respond("mc_issue_get", &issue_xml(1, 90, ""))
            .respond(
                "mc_issue_get",
                &issue_xml(
                    2,
                    10,
                    "<custom_fields>\
                       <item><field><id>1</id></field><value>x</value></item>\
                       <item><field><id>2</id></field><value></value></item>\
                     </custom_fields>",
                ),
            )
            .respond("mc_issue_update", "<return>true</return>");

        let changes = client(&transport)
            .issue_set_status(&CallContext::new(), 80, &[1, 2])
            .await
            .unwrap();

        assert!(matches!(changes[0], StatusChange::Skipped { issue_id: 1, .. }));
        assert_eq!(
            changes[1],
            StatusChange::Updated {
                issue_id: 2,
                status_id: 80
            }
        );
        let sent = transport.request_body(2);
        let issue = sent.find("issue").unwrap();
        assert_eq!(issue.child("status").unwrap().child("id").unwrap().text, "80");
        assert!(issue.child("status").unwrap().child("name").is_none());
        assert_eq!(issue.child("custom_fields").unwrap().children.len(), 1);
    }

    #[tokio::test]
    async fn test_version_find_walks_subprojects() {
        let transport = MockTransport::default();
        transport
            .respond(
                "mc_projects_get_user_accessible",
                "<return><item><id>1</id><name>a</name>\
                   <subprojects><item><id>2</id><name>b</name></item></subprojects>\
                 </item></return>",
            )
            .respond("mc_project_get_versions", "<return/>")
            .respond(
                "mc_project_get_versions",
                "<return><item><id>31</id><name>2.0</name><project_id>2</project_id></item></return>",
            );

        let found = client(&transport)
            .project_version_find(&CallContext::new(), 31)
            .await
            .unwrap();
        assert_eq!(found.unwrap().project_id, Some(2));
    }

    #[tokio::test]
    async fn test_filter_search_decodes_issues() {
        let transport = MockTransport::default();
        transport.respond(
            "mc_filter_search_issues",
            &format!("<return><item>{}</item></return>", "<id>#8</id><summary>found</summary>"),
        );

        let filter = FilterSearchData {
            search: Some("found".to_string()),
            ..Default::default()
        };
        let issues = client(&transport)
            .filter_search_issues(&CallContext::new(), filter, 1, 10)
            .await
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, Some(8));
    }

    #[tokio::test]
    async fn test_issue_add_and_lookups() {
        let transport = MockTransport::default();
        transport
            .respond("mc_issue_add", "<return>1201</return>")
            .respond("mc_issue_get_biggest_id", "<return>1201</return>")
            .respond(
                "mc_enum_status",
                "<return><item><id>10</id><name>new</name></item>\
                 <item><id>80</id><name>resolved</name></item></return>",
            );
        let client = client(&transport);
        let ctx = CallContext::new();

        let issue = IssueData {
            project: Some(ObjectRef::with_id(1)),
            summary: Some("Crash on save".to_string()),
            ..Default::default()
        };
        assert_eq!(client.issue_add(&ctx, issue).await.unwrap(), 1201);
        assert_eq!(client.issue_get_biggest_id(&ctx, 1).await.unwrap(), 1201);
        let statuses = client.enum_status(&ctx).await.unwrap();
        assert_eq!(statuses[1].display_name(), "resolved");

        let sent = transport.request_body(0);
        let issue = sent.find("issue").unwrap();
        assert_eq!(issue.child("summary").unwrap().text, "Crash on save");
        assert!(issue.child("id").is_none());
        assert!(issue.child("due_date").is_none());
    }

    #[test]
    fn test_child_context_cancellation() {
        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();
        assert!(parent.check().is_ok());
        assert!(child.check().is_err());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_status_change_serializes_tagged() {
        let json = serde_json::to_value(StatusChange::Updated {
            issue_id: 2,
            status_id: 80,
        })
        .unwrap();
        assert_eq!(json["result"], "updated");
        assert_eq!(json["issue_id"], 2);
    }

    #[test]
    fn test_custom_field_retain_drops_empty() {
        let mut fields = vec![
            CustomFieldValue {
                value: Some(String::new()),
                ..Default::default()
            },
            CustomFieldValue {
                value: Some("1".to_string()),
                ..Default::default()
            },
        ];
        fields.retain(|f| !f.is_empty());
        assert_eq!(fields.len(), 1);
    }
}
