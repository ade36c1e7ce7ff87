//! Typed parsing of one connection config.
//!
//! Checks run in a fixed order so a config with several problems always
//! reports the same one: the `type` discriminant, required fields, field
//! shapes, unknown keys, and finally cross-field requirements.

use codesync_domain::connection::{
    DEFAULT_AZURE_DEVOPS_URL, DEFAULT_BITBUCKET_CLOUD_URL, DEFAULT_GITEA_URL, DEFAULT_GITHUB_URL,
    DEFAULT_GITLAB_URL,
};
use codesync_domain::{
    AzureDevOpsConnection, AzureDevOpsDeploymentType, AzureDevOpsExclude, BitbucketConnection,
    BitbucketDeploymentType, BitbucketExclude, CodeHostType, ConnectionConfig, FailureKind,
    GerritConnection, GerritExclude, GitConnection, GiteaConnection, GiteaExclude,
    GithubConnection, GithubExclude, GitlabAccessLevel, GitlabConnection, GitlabExclude,
    RevisionsConfig, SecretRef, SizeRange, validate_glob,
};
use codesync_shared::{ErrorCode, ErrorEnvelope};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;
use url::Url;

static HTTP_URL: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$"));
static FILE_URL: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^file://\S+$"));
static SIMPLE_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$"));
static GROUP_PATH: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+(/[A-Za-z0-9_.-]+)*$"));
static OWNER_REPO: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$"));

const REVISION_FIELDS: &[&str] = &["branches", "tags"];
const SIZE_FIELDS: &[&str] = &["min", "max"];

/// Connection config validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfigError {
    /// `type` is not one of the supported literals.
    UnknownConnectionType {
        /// Raw `type` value (JSON-encoded when not a string).
        found: String,
    },
    /// A required field is absent.
    MissingRequiredField {
        /// Field name.
        field: String,
    },
    /// A field has the wrong type, pattern, or enum value.
    InvalidFieldShape {
        /// Dotted field path, e.g. `exclude.size`.
        field: String,
        /// What was expected.
        reason: String,
    },
    /// A key is not part of the connection type's schema.
    UnexpectedField {
        /// Dotted field path, e.g. `exclude.stars`.
        field: String,
    },
}

impl ConnectionConfigError {
    /// Failure kind recorded on jobs and in error codes.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownConnectionType { .. } => FailureKind::UnknownConnectionType,
            Self::MissingRequiredField { .. } => FailureKind::MissingRequiredField,
            Self::InvalidFieldShape { .. } => FailureKind::InvalidFieldShape,
            Self::UnexpectedField { .. } => FailureKind::UnexpectedField,
        }
    }

    /// Field the error refers to (`type` for unknown connection types).
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownConnectionType { .. } => "type",
            Self::MissingRequiredField { field }
            | Self::InvalidFieldShape { field, .. }
            | Self::UnexpectedField { field } => field,
        }
    }

    fn shape(field: String, reason: impl Into<String>) -> Self {
        Self::InvalidFieldShape {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConnectionConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownConnectionType { found } => write!(
                formatter,
                "unknown connection type {found}; expected one of github, gitlab, gitea, gerrit, \
                 bitbucket, azuredevops, git"
            ),
            Self::MissingRequiredField { field } => {
                write!(formatter, "missing required field `{field}`")
            },
            Self::InvalidFieldShape { field, reason } => {
                write!(formatter, "field `{field}` {reason}")
            },
            Self::UnexpectedField { field } => write!(formatter, "unexpected field `{field}`"),
        }
    }
}

impl std::error::Error for ConnectionConfigError {}

impl From<ConnectionConfigError> for ErrorEnvelope {
    fn from(error: ConnectionConfigError) -> Self {
        let envelope = error
            .kind()
            .envelope(error.to_string())
            .with_metadata("field", error.field().to_owned());
        match error {
            ConnectionConfigError::UnknownConnectionType { found } => {
                envelope.with_metadata("found", found)
            },
            _ => envelope,
        }
    }
}

/// Parse a connection config from JSON text.
pub fn parse_connection_config_json(input: &str) -> Result<ConnectionConfig, ErrorEnvelope> {
    let raw: Value = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid connection JSON: {error}"),
        )
        .with_metadata("source", "connection")
    })?;
    parse_connection_config(&raw).map_err(Into::into)
}

/// Validate a raw connection value and apply defaults.
pub fn parse_connection_config(raw: &Value) -> Result<ConnectionConfig, ConnectionConfigError> {
    let object = raw.as_object().ok_or_else(|| {
        ConnectionConfigError::shape("$".to_owned(), "must be a JSON object")
    })?;
    let kind = connection_type(object)?;
    let schema = TypeSchema::of(kind);

    if let Some(field) = schema
        .required
        .iter()
        .find(|field| !object.contains_key(**field))
    {
        return Err(ConnectionConfigError::MissingRequiredField {
            field: (*field).to_owned(),
        });
    }

    let fields = Fields::root(object);
    let config = match kind {
        CodeHostType::Github => ConnectionConfig::Github(github(&fields)?),
        CodeHostType::Gitlab => ConnectionConfig::Gitlab(gitlab(&fields)?),
        CodeHostType::Gitea => ConnectionConfig::Gitea(gitea(&fields)?),
        CodeHostType::Gerrit => ConnectionConfig::Gerrit(gerrit(&fields)?),
        CodeHostType::Bitbucket => ConnectionConfig::Bitbucket(bitbucket(&fields)?),
        CodeHostType::AzureDevOps => ConnectionConfig::AzureDevOps(azure_devops(&fields)?),
        CodeHostType::Git => ConnectionConfig::Git(git(&fields)?),
    };

    reject_unknown_fields(&fields, &schema)?;

    if let ConnectionConfig::Bitbucket(bitbucket) = &config
        && bitbucket.deployment_type == BitbucketDeploymentType::Server
        && !object.contains_key("url")
    {
        return Err(ConnectionConfigError::MissingRequiredField {
            field: "url".to_owned(),
        });
    }

    Ok(config)
}

fn connection_type(object: &Map<String, Value>) -> Result<CodeHostType, ConnectionConfigError> {
    match object.get("type") {
        None => Err(ConnectionConfigError::MissingRequiredField {
            field: "type".to_owned(),
        }),
        Some(Value::String(literal)) => CodeHostType::from_literal(literal).ok_or_else(|| {
            ConnectionConfigError::UnknownConnectionType {
                found: literal.clone(),
            }
        }),
        Some(other) => Err(ConnectionConfigError::UnknownConnectionType {
            found: other.to_string(),
        }),
    }
}

struct TypeSchema {
    required: &'static [&'static str],
    fields: &'static [&'static str],
    exclude: &'static [&'static str],
}

impl TypeSchema {
    const fn of(kind: CodeHostType) -> Self {
        match kind {
            CodeHostType::Github => Self {
                required: &[],
                fields: &[
                    "type", "token", "url", "users", "orgs", "repos", "topics", "exclude",
                    "revisions",
                ],
                exclude: &["forks", "archived", "repos", "topics", "size"],
            },
            CodeHostType::Gitlab => Self {
                required: &[],
                fields: &[
                    "type",
                    "token",
                    "url",
                    "all",
                    "users",
                    "groups",
                    "projects",
                    "topics",
                    "minAccessLevel",
                    "exclude",
                    "revisions",
                ],
                exclude: &["forks", "archived", "projects", "topics", "size"],
            },
            CodeHostType::Gitea => Self {
                required: &[],
                fields: &[
                    "type", "token", "url", "orgs", "repos", "users", "exclude", "revisions",
                ],
                exclude: &["forks", "archived", "repos"],
            },
            CodeHostType::Gerrit => Self {
                required: &["url"],
                fields: &["type", "url", "projects", "exclude", "revisions"],
                exclude: &["projects", "readOnly", "hidden"],
            },
            CodeHostType::Bitbucket => Self {
                required: &[],
                fields: &[
                    "type",
                    "user",
                    "token",
                    "url",
                    "deploymentType",
                    "workspaces",
                    "projects",
                    "repos",
                    "exclude",
                    "revisions",
                ],
                exclude: &["forks", "archived", "repos"],
            },
            CodeHostType::AzureDevOps => Self {
                required: &["token", "deploymentType"],
                fields: &[
                    "type",
                    "token",
                    "url",
                    "deploymentType",
                    "useTfsPath",
                    "orgs",
                    "projects",
                    "repos",
                    "exclude",
                    "revisions",
                ],
                exclude: &["disabled", "repos", "projects", "size"],
            },
            CodeHostType::Git => Self {
                required: &["url"],
                fields: &["type", "url", "revisions"],
                exclude: &[],
            },
        }
    }
}

fn reject_unknown_fields(
    fields: &Fields<'_>,
    schema: &TypeSchema,
) -> Result<(), ConnectionConfigError> {
    fields.reject_unknown(schema.fields)?;
    if let Some(exclude) = fields.nested("exclude")? {
        exclude.reject_unknown(schema.exclude)?;
        if let Some(size) = exclude.nested("size")? {
            size.reject_unknown(SIZE_FIELDS)?;
        }
    }
    if let Some(revisions) = fields.nested("revisions")? {
        revisions.reject_unknown(REVISION_FIELDS)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    /// `^[\w.-]+$`
    Name,
    /// `^[\w.-]+(/[\w.-]+)*$`
    Path,
    /// `^[\w.-]+/[\w.-]+$`
    OwnerRepo,
    /// Any pattern that compiles in the glob dialect.
    Glob,
}

impl Rule {
    fn check(self, value: &str) -> Result<(), String> {
        let (pattern, expected) = match self {
            Self::Name => (&SIMPLE_NAME, r"must match ^[\w.-]+$"),
            Self::Path => (&GROUP_PATH, r"must match ^[\w.-]+(/[\w.-]+)*$"),
            Self::OwnerRepo => (&OWNER_REPO, r"must match ^[\w.-]+/[\w.-]+$"),
            Self::Glob => {
                if value.is_empty() {
                    return Err("must be non-empty".to_owned());
                }
                return validate_glob(value).map_err(|error| error.to_string());
            },
        };
        if matches_pattern(pattern, value) {
            Ok(())
        } else {
            Err(expected.to_owned())
        }
    }
}

fn matches_pattern(pattern: &LazyLock<Result<Regex, regex::Error>>, value: &str) -> bool {
    pattern
        .as_ref()
        .is_ok_and(|regex| regex.is_match(value))
}

/// Read-only view of one JSON object level, tracking the dotted path prefix.
struct Fields<'a> {
    object: &'a Map<String, Value>,
    prefix: String,
}

impl<'a> Fields<'a> {
    const fn root(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            prefix: String::new(),
        }
    }

    fn path(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn nested(&self, key: &str) -> Result<Option<Self>, ConnectionConfigError> {
        match self.object.get(key) {
            None => Ok(None),
            Some(Value::Object(object)) => Ok(Some(Self {
                object,
                prefix: format!("{}.", self.path(key)),
            })),
            Some(_) => Err(ConnectionConfigError::shape(
                self.path(key),
                "must be an object",
            )),
        }
    }

    fn reject_unknown(&self, allowed: &[&str]) -> Result<(), ConnectionConfigError> {
        match self.object.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(ConnectionConfigError::UnexpectedField {
                field: self.path(key),
            }),
            None => Ok(()),
        }
    }

    fn bool(&self, key: &str) -> Result<bool, ConnectionConfigError> {
        match self.object.get(key) {
            None => Ok(false),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(ConnectionConfigError::shape(
                self.path(key),
                "must be a boolean",
            )),
        }
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, ConnectionConfigError> {
        match self.object.get(key) {
            None => Ok(None),
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(Some(value.as_str())),
            Some(_) => Err(ConnectionConfigError::shape(
                self.path(key),
                "must be a non-empty string",
            )),
        }
    }

    fn strings(&self, key: &str, rule: Rule) -> Result<Vec<Box<str>>, ConnectionConfigError> {
        let Some(value) = self.object.get(key) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(ConnectionConfigError::shape(
                self.path(key),
                "must be an array of strings",
            ));
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let field = || format!("{}[{index}]", self.path(key));
                let Value::String(item) = item else {
                    return Err(ConnectionConfigError::shape(field(), "must be a string"));
                };
                rule.check(item)
                    .map_err(|reason| ConnectionConfigError::shape(field(), reason))?;
                Ok(item.as_str().into())
            })
            .collect()
    }

    fn url(&self, key: &str, allow_file: bool) -> Result<Option<Box<str>>, ConnectionConfigError> {
        let Some(value) = self.string(key)? else {
            return Ok(None);
        };
        if matches_pattern(&HTTP_URL, value) || (allow_file && matches_pattern(&FILE_URL, value))
        {
            return Ok(Some(value.into()));
        }
        let expected = if allow_file {
            "must be an http(s) or file:// URL"
        } else {
            "must be an http(s) URL"
        };
        Err(ConnectionConfigError::shape(
            self.path(key),
            format!("{expected} (got {})", sanitize_url_for_error(value)),
        ))
    }

    fn secret(&self, key: &str) -> Result<Option<SecretRef>, ConnectionConfigError> {
        let Some(value) = self.object.get(key) else {
            return Ok(None);
        };
        let invalid = || {
            ConnectionConfigError::shape(
                self.path(key),
                "must be { \"env\": <name> } or { \"googleCloudSecret\": <path> }",
            )
        };
        let Value::Object(object) = value else {
            return Err(invalid());
        };
        let mut entries = object.iter();
        match (entries.next(), entries.next()) {
            (Some((variant, Value::String(target))), None) if !target.trim().is_empty() => {
                match variant.as_str() {
                    "env" => Ok(Some(SecretRef::env(target.trim()))),
                    "googleCloudSecret" => Ok(Some(SecretRef::google_cloud(target.trim()))),
                    _ => Err(invalid()),
                }
            },
            _ => Err(invalid()),
        }
    }

    fn size(&self, key: &str) -> Result<Option<SizeRange>, ConnectionConfigError> {
        let Some(size) = self.nested(key)? else {
            return Ok(None);
        };
        let bound = |name: &str| match size.object.get(name) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                ConnectionConfigError::shape(size.path(name), "must be a non-negative integer")
            }),
        };
        let range = SizeRange {
            min: bound("min")?,
            max: bound("max")?,
        };
        if let (Some(min), Some(max)) = (range.min, range.max)
            && min > max
        {
            return Err(ConnectionConfigError::shape(
                self.path(key),
                format!("min ({min}) must not exceed max ({max})"),
            ));
        }
        Ok(Some(range))
    }

    fn revisions(&self) -> Result<RevisionsConfig, ConnectionConfigError> {
        let Some(revisions) = self.nested("revisions")? else {
            return Ok(RevisionsConfig::default());
        };
        Ok(RevisionsConfig {
            branches: revisions.strings("branches", Rule::Glob)?,
            tags: revisions.strings("tags", Rule::Glob)?,
        })
    }

    fn exclude(&self) -> Result<Option<Self>, ConnectionConfigError> {
        self.nested("exclude")
    }
}

fn sanitize_url_for_error(value: &str) -> String {
    match Url::parse(value) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            if parsed.set_username("").is_err() || parsed.set_password(None).is_err() {
                return "[invalid url]".to_owned();
            }
            parsed.to_string()
        },
        Ok(parsed) => parsed.to_string(),
        Err(_) => value.to_owned(),
    }
}

fn github(fields: &Fields<'_>) -> Result<GithubConnection, ConnectionConfigError> {
    let token = fields.secret("token")?;
    let url = fields.url("url", false)?;
    let users = fields.strings("users", Rule::Name)?;
    let orgs = fields.strings("orgs", Rule::Name)?;
    let repos = fields.strings("repos", Rule::OwnerRepo)?;
    let topics = fields.strings("topics", Rule::Glob)?;
    let exclude = match fields.exclude()? {
        None => GithubExclude::default(),
        Some(exclude) => GithubExclude {
            forks: exclude.bool("forks")?,
            archived: exclude.bool("archived")?,
            repos: exclude.strings("repos", Rule::Glob)?,
            topics: exclude.strings("topics", Rule::Glob)?,
            size: exclude.size("size")?,
        },
    };
    Ok(GithubConnection {
        token,
        url: url.unwrap_or_else(|| DEFAULT_GITHUB_URL.into()),
        users,
        orgs,
        repos,
        topics,
        exclude,
        revisions: fields.revisions()?,
    })
}

fn gitlab(fields: &Fields<'_>) -> Result<GitlabConnection, ConnectionConfigError> {
    let token = fields.secret("token")?;
    let url = fields.url("url", false)?;
    let all = fields.bool("all")?;
    let users = fields.strings("users", Rule::Name)?;
    let groups = fields.strings("groups", Rule::Path)?;
    let projects = fields.strings("projects", Rule::Path)?;
    let topics = fields.strings("topics", Rule::Glob)?;
    let min_access_level = match fields.object.get("minAccessLevel") {
        None => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(GitlabAccessLevel::from_level)
                .ok_or_else(|| {
                    ConnectionConfigError::shape(
                        fields.path("minAccessLevel"),
                        format!("must be one of {:?}", GitlabAccessLevel::ACCEPTED),
                    )
                })?,
        ),
    };
    let exclude = match fields.exclude()? {
        None => GitlabExclude::default(),
        Some(exclude) => GitlabExclude {
            forks: exclude.bool("forks")?,
            archived: exclude.bool("archived")?,
            projects: exclude.strings("projects", Rule::Glob)?,
            topics: exclude.strings("topics", Rule::Glob)?,
            size: exclude.size("size")?,
        },
    };
    Ok(GitlabConnection {
        token,
        url: url.unwrap_or_else(|| DEFAULT_GITLAB_URL.into()),
        all,
        users,
        groups,
        projects,
        topics,
        min_access_level,
        exclude,
        revisions: fields.revisions()?,
    })
}

fn gitea(fields: &Fields<'_>) -> Result<GiteaConnection, ConnectionConfigError> {
    let token = fields.secret("token")?;
    let url = fields.url("url", false)?;
    let orgs = fields.strings("orgs", Rule::Name)?;
    let repos = fields.strings("repos", Rule::OwnerRepo)?;
    let users = fields.strings("users", Rule::Name)?;
    let exclude = match fields.exclude()? {
        None => GiteaExclude::default(),
        Some(exclude) => GiteaExclude {
            forks: exclude.bool("forks")?,
            archived: exclude.bool("archived")?,
            repos: exclude.strings("repos", Rule::Glob)?,
        },
    };
    Ok(GiteaConnection {
        token,
        url: url.unwrap_or_else(|| DEFAULT_GITEA_URL.into()),
        orgs,
        repos,
        users,
        exclude,
        revisions: fields.revisions()?,
    })
}

fn gerrit(fields: &Fields<'_>) -> Result<GerritConnection, ConnectionConfigError> {
    let url = required_url(fields, false)?;
    let projects = fields.strings("projects", Rule::Glob)?;
    let exclude = match fields.exclude()? {
        None => GerritExclude::default(),
        Some(exclude) => GerritExclude {
            projects: exclude.strings("projects", Rule::Glob)?,
            read_only: exclude.bool("readOnly")?,
            hidden: exclude.bool("hidden")?,
        },
    };
    Ok(GerritConnection {
        url,
        projects,
        exclude,
        revisions: fields.revisions()?,
    })
}

fn bitbucket(fields: &Fields<'_>) -> Result<BitbucketConnection, ConnectionConfigError> {
    let user = fields.string("user")?.map(Into::into);
    let token = fields.secret("token")?;
    let url = fields.url("url", false)?;
    let deployment_type = match fields.string("deploymentType")? {
        None | Some("cloud") => BitbucketDeploymentType::Cloud,
        Some("server") => BitbucketDeploymentType::Server,
        Some(_) => {
            return Err(ConnectionConfigError::shape(
                fields.path("deploymentType"),
                "must be `cloud` or `server`",
            ));
        },
    };
    let workspaces = fields.strings("workspaces", Rule::Name)?;
    let projects = fields.strings("projects", Rule::Glob)?;
    let repos = fields.strings("repos", Rule::Glob)?;
    let exclude = match fields.exclude()? {
        None => BitbucketExclude::default(),
        Some(exclude) => BitbucketExclude {
            forks: exclude.bool("forks")?,
            archived: exclude.bool("archived")?,
            repos: exclude.strings("repos", Rule::Glob)?,
        },
    };
    let url = match (url, deployment_type) {
        (Some(url), _) => url,
        (None, BitbucketDeploymentType::Cloud) => DEFAULT_BITBUCKET_CLOUD_URL.into(),
        // Server without `url` is rejected once unknown keys have been checked.
        (None, BitbucketDeploymentType::Server) => Box::default(),
    };
    Ok(BitbucketConnection {
        user,
        token,
        url,
        deployment_type,
        workspaces,
        projects,
        repos,
        exclude,
        revisions: fields.revisions()?,
    })
}

fn azure_devops(fields: &Fields<'_>) -> Result<AzureDevOpsConnection, ConnectionConfigError> {
    let token = fields.secret("token")?.ok_or_else(|| {
        ConnectionConfigError::MissingRequiredField {
            field: "token".to_owned(),
        }
    })?;
    let url = fields.url("url", false)?;
    let deployment_type = match fields.string("deploymentType")? {
        Some("cloud") => AzureDevOpsDeploymentType::Cloud,
        Some("server") => AzureDevOpsDeploymentType::Server,
        None => {
            return Err(ConnectionConfigError::MissingRequiredField {
                field: "deploymentType".to_owned(),
            });
        },
        Some(_) => {
            return Err(ConnectionConfigError::shape(
                fields.path("deploymentType"),
                "must be `cloud` or `server`",
            ));
        },
    };
    let use_tfs_path = fields.bool("useTfsPath")?;
    let orgs = fields.strings("orgs", Rule::Name)?;
    let projects = fields.strings("projects", Rule::Path)?;
    let repos = fields.strings("repos", Rule::Path)?;
    let exclude = match fields.exclude()? {
        None => AzureDevOpsExclude::default(),
        Some(exclude) => AzureDevOpsExclude {
            disabled: exclude.bool("disabled")?,
            repos: exclude.strings("repos", Rule::Glob)?,
            projects: exclude.strings("projects", Rule::Glob)?,
            size: exclude.size("size")?,
        },
    };
    Ok(AzureDevOpsConnection {
        token,
        url: url.unwrap_or_else(|| DEFAULT_AZURE_DEVOPS_URL.into()),
        deployment_type,
        use_tfs_path,
        orgs,
        projects,
        repos,
        exclude,
        revisions: fields.revisions()?,
    })
}

fn git(fields: &Fields<'_>) -> Result<GitConnection, ConnectionConfigError> {
    let url = required_url(fields, true)?;
    if let Some(path) = url.strip_prefix("file://") {
        Rule::Glob
            .check(path)
            .map_err(|reason| ConnectionConfigError::shape(fields.path("url"), reason))?;
    }
    Ok(GitConnection {
        url,
        revisions: fields.revisions()?,
    })
}

fn required_url(fields: &Fields<'_>, allow_file: bool) -> Result<Box<str>, ConnectionConfigError> {
    fields
        .url("url", allow_file)?
        .ok_or_else(|| ConnectionConfigError::MissingRequiredField {
            field: "url".to_owned(),
        })
}
