use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Implements `as_str`, `FromStr` and `Display` from one variant/string table
/// so the text form always matches the stored `string_value`.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

/// ProjectStatus enum for project lifecycle.
/// NOTE: Use db_type = "Text" for SQLite compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "archived")]
    Archived,
}

text_enum!(ProjectStatus {
    Active => "active",
    Paused => "paused",
    Archived => "archived",
});

/// ServiceType enum for the kind of workload a service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    #[sea_orm(string_value = "web")]
    Web,
    #[sea_orm(string_value = "worker")]
    Worker,
    #[sea_orm(string_value = "docker")]
    Docker,
    #[sea_orm(string_value = "static")]
    Static,
}

text_enum!(ServiceType {
    Web => "web",
    Worker => "worker",
    Docker => "docker",
    Static => "static",
});

/// Git hosting provider backing a repository-built service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum RepositoryProvider {
    #[sea_orm(string_value = "github")]
    Github,
    #[sea_orm(string_value = "gitlab")]
    Gitlab,
    #[sea_orm(string_value = "bitbucket")]
    Bitbucket,
}

text_enum!(RepositoryProvider {
    Github => "github",
    Gitlab => "gitlab",
    Bitbucket => "bitbucket",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "deploying")]
    Deploying,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "stopped")]
    Stopped,
    #[sea_orm(string_value = "failed")]
    Failed,
}

text_enum!(ServiceStatus {
    Created => "created",
    Deploying => "deploying",
    Running => "running",
    Stopped => "stopped",
    Failed => "failed",
});

/// DeploymentStatus enum for deployment state tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "building")]
    Building,
    #[sea_orm(string_value = "deploying")]
    Deploying,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "stopped")]
    Stopped,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

text_enum!(DeploymentStatus {
    Pending => "pending",
    Building => "building",
    Deploying => "deploying",
    Running => "running",
    Failed => "failed",
    Stopped => "stopped",
    Cancelled => "cancelled",
});

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Failed | DeploymentStatus::Stopped | DeploymentStatus::Cancelled
        )
    }

    /// Forward-only lifecycle: pending -> building -> deploying -> running -> stopped.
    /// Any non-terminal state may fail or be cancelled; a build may be skipped for
    /// image-backed services (pending -> deploying).
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        match (self, next) {
            (current, Failed | Cancelled) => !current.is_terminal(),
            (Pending, Building | Deploying) => true,
            (Building, Deploying) => true,
            (Deploying, Running) => true,
            (Running, Stopped) => true,
            _ => false,
        }
    }
}

/// BuildStatus enum for build queue entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "building")]
    Building,
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

text_enum!(BuildStatus {
    Queued => "queued",
    Building => "building",
    Succeeded => "succeeded",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        use BuildStatus::*;
        matches!(
            (self, next),
            (Queued, Building) | (Queued, Cancelled) | (Building, Succeeded | Failed | Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "hobby")]
    Hobby,
    #[sea_orm(string_value = "pro")]
    Pro,
    #[sea_orm(string_value = "enterprise")]
    Enterprise,
}

text_enum!(SubscriptionPlan {
    Free => "free",
    Hobby => "hobby",
    Pro => "pro",
    Enterprise => "enterprise",
});

/// Mirrors the payment processor's subscription states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "trialing")]
    Trialing,
    #[sea_orm(string_value = "past_due")]
    PastDue,
    #[sea_orm(string_value = "canceled")]
    Canceled,
    #[sea_orm(string_value = "incomplete")]
    Incomplete,
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
}

text_enum!(SubscriptionStatus {
    Active => "active",
    Trialing => "trialing",
    PastDue => "past_due",
    Canceled => "canceled",
    Incomplete => "incomplete",
    Unpaid => "unpaid",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "void")]
    Void,
    #[sea_orm(string_value = "uncollectible")]
    Uncollectible,
}

text_enum!(InvoiceStatus {
    Draft => "draft",
    Open => "open",
    Paid => "paid",
    Void => "void",
    Uncollectible => "uncollectible",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum GdprRequestType {
    #[sea_orm(string_value = "export")]
    Export,
    #[sea_orm(string_value = "deletion")]
    Deletion,
}

text_enum!(GdprRequestType {
    Export => "export",
    Deletion => "deletion",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum GdprRequestStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

text_enum!(GdprRequestStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl GdprRequestStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, GdprRequestStatus::Pending | GdprRequestStatus::Processing)
    }
}
