//! Request types for each MantisConnect remote procedure.
//!
//! Each request knows its operation name, its result type and how to write
//! its parameters into an open [`Envelope`](crate::envelope::Envelope).
//! Parameter element names follow the server's WSDL, which is not entirely
//! consistent (`issue_id` in most places, `issueId` in `mc_issue_update`).

use quick_xml::Writer;

use crate::error::MantisError;
use crate::models::{
    AccountData, FilterData, FilterSearchData, IssueData, IssueNoteData, ObjectRef, ProjectData,
    ProjectVersionData, UserData,
};
use crate::xml::{end, start, write_field, FromXml};

/// Default page size for paged issue listings.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// A remote procedure call with typed parameters and result.
pub trait SoapRequest {
    /// Operation element name, e.g. `mc_issue_get`.
    const OPERATION: &'static str;

    /// Whether username and password are sent.
    const AUTHENTICATED: bool = true;

    /// Decoded type of the `return` element.
    type Output: FromXml;

    /// Writes the operation parameters (after the credentials).
    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError>;
}

/// `mc_login`: validates credentials and returns the user.
#[derive(Debug, Clone, Default)]
pub struct Login;

impl SoapRequest for Login {
    const OPERATION: &'static str = "mc_login";
    type Output = UserData;

    fn write_params(&self, _writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        Ok(())
    }
}

/// `mc_version`: the server's MantisBT version.
#[derive(Debug, Clone, Default)]
pub struct Version;

impl SoapRequest for Version {
    const OPERATION: &'static str = "mc_version";
    const AUTHENTICATED: bool = false;
    type Output = String;

    fn write_params(&self, _writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        Ok(())
    }
}

/// `mc_issue_exists`
#[derive(Debug, Clone)]
pub struct IssueExists {
    pub issue_id: u64,
}

impl SoapRequest for IssueExists {
    const OPERATION: &'static str = "mc_issue_exists";
    type Output = bool;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issue_id", &self.issue_id)
    }
}

/// `mc_issue_get`
#[derive(Debug, Clone)]
pub struct IssueGet {
    pub issue_id: u64,
}

impl SoapRequest for IssueGet {
    const OPERATION: &'static str = "mc_issue_get";
    type Output = IssueData;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issue_id", &self.issue_id)
    }
}

/// `mc_issue_get_biggest_id`: the highest issue ID in a project.
#[derive(Debug, Clone)]
pub struct IssueGetBiggestId {
    pub project_id: u64,
}

impl SoapRequest for IssueGetBiggestId {
    const OPERATION: &'static str = "mc_issue_get_biggest_id";
    type Output = u64;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "project_id", &self.project_id)
    }
}

/// `mc_issue_add`: returns the new issue's ID.
#[derive(Debug, Clone)]
pub struct IssueAdd {
    pub issue: IssueData,
}

impl SoapRequest for IssueAdd {
    const OPERATION: &'static str = "mc_issue_add";
    type Output = u64;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issue", &self.issue)
    }
}

/// `mc_issue_update`
#[derive(Debug, Clone)]
pub struct IssueUpdate {
    pub issue_id: u64,
    pub issue: IssueData,
}

impl SoapRequest for IssueUpdate {
    const OPERATION: &'static str = "mc_issue_update";
    type Output = bool;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issueId", &self.issue_id)?;
        write_field(writer, "issue", &self.issue)
    }
}

/// `mc_issue_delete`
#[derive(Debug, Clone)]
pub struct IssueDelete {
    pub issue_id: u64,
}

impl SoapRequest for IssueDelete {
    const OPERATION: &'static str = "mc_issue_delete";
    type Output = bool;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issue_id", &self.issue_id)
    }
}

/// `mc_issue_note_add`: returns the new note's ID.
#[derive(Debug, Clone)]
pub struct IssueNoteAdd {
    pub issue_id: u64,
    pub note: IssueNoteData,
}

impl SoapRequest for IssueNoteAdd {
    const OPERATION: &'static str = "mc_issue_note_add";
    type Output = u64;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issue_id", &self.issue_id)?;
        write_field(writer, "note", &self.note)
    }
}

/// `mc_issue_attachment_add` metadata.
///
/// The `content` parameter is streamed after these by the client.
#[derive(Debug, Clone)]
pub struct IssueAttachmentAdd {
    pub issue_id: u64,
    /// File name shown in the issue.
    pub name: String,
    /// MIME type.
    pub file_type: String,
}

impl SoapRequest for IssueAttachmentAdd {
    const OPERATION: &'static str = "mc_issue_attachment_add";
    type Output = u64;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "issue_id", &self.issue_id)?;
        write_field(writer, "name", &self.name)?;
        write_field(writer, "file_type", &self.file_type)
    }
}

/// `mc_project_get_users`: users with at least `access` on a project.
#[derive(Debug, Clone)]
pub struct ProjectGetUsers {
    pub project_id: u64,
    pub access: u64,
}

impl SoapRequest for ProjectGetUsers {
    const OPERATION: &'static str = "mc_project_get_users";
    type Output = Vec<AccountData>;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "project_id", &self.project_id)?;
        write_field(writer, "access", &self.access)
    }
}

/// `mc_projects_get_user_accessible`
#[derive(Debug, Clone, Default)]
pub struct ProjectsGetUserAccessible;

impl SoapRequest for ProjectsGetUserAccessible {
    const OPERATION: &'static str = "mc_projects_get_user_accessible";
    type Output = Vec<ProjectData>;

    fn write_params(&self, _writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        Ok(())
    }
}

/// `mc_project_get_issues`: one page of a project's issues.
#[derive(Debug, Clone)]
pub struct ProjectGetIssues {
    pub project_id: u64,
    /// 1-based page number.
    pub page_number: u64,
    pub per_page: u64,
}

impl SoapRequest for ProjectGetIssues {
    const OPERATION: &'static str = "mc_project_get_issues";
    type Output = Vec<IssueData>;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "project_id", &self.project_id)?;
        write_field(writer, "page_number", &self.page_number)?;
        write_field(writer, "per_page", &self.per_page)
    }
}

/// `mc_project_get_versions`
#[derive(Debug, Clone)]
pub struct ProjectGetVersions {
    pub project_id: u64,
}

impl SoapRequest for ProjectGetVersions {
    const OPERATION: &'static str = "mc_project_get_versions";
    type Output = Vec<ProjectVersionData>;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "project_id", &self.project_id)
    }
}

/// `mc_project_version_add`: returns the new version's ID.
#[derive(Debug, Clone)]
pub struct ProjectVersionAdd {
    pub version: ProjectVersionData,
}

impl SoapRequest for ProjectVersionAdd {
    const OPERATION: &'static str = "mc_project_version_add";
    type Output = u64;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "version", &self.version)
    }
}

/// `mc_project_version_update`
#[derive(Debug, Clone)]
pub struct ProjectVersionUpdate {
    pub version_id: u64,
    pub version: ProjectVersionData,
}

impl SoapRequest for ProjectVersionUpdate {
    const OPERATION: &'static str = "mc_project_version_update";
    type Output = bool;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "version_id", &self.version_id)?;
        write_field(writer, "version", &self.version)
    }
}

/// `mc_project_version_delete`
#[derive(Debug, Clone)]
pub struct ProjectVersionDelete {
    pub version_id: u64,
}

impl SoapRequest for ProjectVersionDelete {
    const OPERATION: &'static str = "mc_project_version_delete";
    type Output = bool;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "version_id", &self.version_id)
    }
}

/// `mc_filter_get`: filters stored for a project (0 for all projects).
#[derive(Debug, Clone)]
pub struct FilterGet {
    pub project_id: u64,
}

impl SoapRequest for FilterGet {
    const OPERATION: &'static str = "mc_filter_get";
    type Output = Vec<FilterData>;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "project_id", &self.project_id)
    }
}

/// `mc_filter_get_issues`: one page of issues matching a stored filter.
#[derive(Debug, Clone)]
pub struct FilterGetIssues {
    pub project_id: u64,
    pub filter_id: u64,
    pub page_number: u64,
    pub per_page: u64,
}

impl SoapRequest for FilterGetIssues {
    const OPERATION: &'static str = "mc_filter_get_issues";
    type Output = Vec<IssueData>;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        write_field(writer, "project_id", &self.project_id)?;
        write_field(writer, "filter_id", &self.filter_id)?;
        write_field(writer, "page_number", &self.page_number)?;
        write_field(writer, "per_page", &self.per_page)
    }
}

/// `mc_filter_search_issues`: one page of issues matching ad-hoc criteria.
#[derive(Debug, Clone)]
pub struct FilterSearchIssues {
    pub filter: FilterSearchData,
    pub page_number: u64,
    pub per_page: u64,
}

impl SoapRequest for FilterSearchIssues {
    const OPERATION: &'static str = "mc_filter_search_issues";
    type Output = Vec<IssueData>;

    fn write_params(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        // The filter element is required even when it sets no criteria.
        if self.filter.is_unrestricted() {
            start(writer, "filter")?;
            end(writer, "filter")?;
        } else {
            write_field(writer, "filter", &self.filter)?;
        }
        write_field(writer, "page_number", &self.page_number)?;
        write_field(writer, "per_page", &self.per_page)
    }
}

/// `mc_enum_status`: the configured issue statuses.
#[derive(Debug, Clone, Default)]
pub struct EnumStatus;

impl SoapRequest for EnumStatus {
    const OPERATION: &'static str = "mc_enum_status";
    type Output = Vec<ObjectRef>;

    fn write_params(&self, _writer: &mut Writer<Vec<u8>>) -> Result<(), MantisError> {
        Ok(())
    }
}
