//! Console subcommands
//!
//! Every command except `login`, `logout`, `status` and `preview` is
//! protected: it runs only while an access token is stored, and otherwise
//! sends the operator to the login route without touching the network.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use common::Secret;
use crm_api::filter::{countries, sole_manager};
use crm_api::{
    CrmApi, Customer, CustomerInput, CustomerQuery, CustomerSort, ExportFormat, ImportFile,
    MarkdownRenderer, MessageQuery, NewDepartment, NewUser, ProfileUpdate, RecordId, Role,
    RoleAssignment, SortOrder, Template, UserQuery, WorkbookPreview, customers_csv,
    customers_xlsx, export_file_name, send_personalized,
};
use crm_auth::{
    DASHBOARD_ROUTE, FileSessionStore, GuardDecision, Navigator, check_route, clear_session,
    store_pair,
};
use crm_client::{ApiClient, FilePart};
use tracing::info;

use crate::config::Config;
use crate::navigator::ConsoleNavigator;

/// Everything a command needs.
pub struct App {
    pub config: Config,
    pub session: Arc<FileSessionStore>,
    pub navigator: Arc<ConsoleNavigator>,
    pub api: CrmApi,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = Arc::new(
            FileSessionStore::load(config.session.path.clone()).with_context(|| {
                format!(
                    "failed to open session file {}",
                    config.session.path.display()
                )
            })?,
        );
        let navigator = Arc::new(ConsoleNavigator::new());
        let client = ApiClient::builder()
            .base_url(config.base_url())
            .session(session.clone())
            .navigator(navigator.clone())
            .timeout(config.timeout())
            .refresh_timeout(config.refresh_timeout())
            .build()
            .context("failed to build API client")?;

        Ok(Self {
            config,
            session,
            navigator,
            api: CrmApi::new(client),
        })
    }

    /// Protected-route check: bail (after redirecting) without a token.
    fn require_session(&self) -> Result<()> {
        match check_route(self.session.as_ref()) {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Redirect(route) => {
                self.navigator.navigate(route);
                bail!("not signed in")
            }
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Read the password from the first line of stdin (default: CRM_PASSWORD)
        #[arg(long)]
        password_stdin: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Show the signed-in user
    Me,
    /// Update your username, email or password
    Profile {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Read the new password and its confirmation as two lines of stdin
        #[arg(long)]
        password_stdin: bool,
    },
    /// Manage customers
    #[command(subcommand)]
    Customers(CustomerCommand),
    /// Manage users
    #[command(subcommand)]
    Users(UserCommand),
    /// Manage departments
    #[command(subcommand)]
    Departments(DepartmentCommand),
    /// Send mail to customers
    #[command(subcommand)]
    Mail(MailCommand),
    /// List sent messages
    History {
        #[arg(long, default_value = "")]
        search: String,
        /// Only messages of this type (e.g. Email)
        #[arg(long = "type")]
        kind: Option<String>,
    },
    /// Render a Markdown message body as HTML
    Preview {
        /// Markdown file
        body: PathBuf,
    },
}

#[derive(Args, Default)]
pub struct CustomerFilter {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    country: Option<String>,
    /// Sort by: name, shortname, city, country, status
    #[arg(long, default_value = "name")]
    sort: String,
    #[arg(long)]
    desc: bool,
}

impl CustomerFilter {
    fn query(&self) -> Result<CustomerQuery> {
        let sort = match self.sort.as_str() {
            "name" => CustomerSort::PartyName,
            "shortname" => CustomerSort::Shortname,
            "city" => CustomerSort::City,
            "country" => CustomerSort::Country,
            "status" => CustomerSort::Status,
            other => bail!("unknown sort field: {other}"),
        };
        Ok(CustomerQuery {
            search: self.search.clone(),
            status: self.status.clone(),
            country: self.country.clone(),
            sort,
            order: if self.desc {
                SortOrder::Desc
            } else {
                SortOrder::Asc
            },
        })
    }
}

#[derive(Args, Default)]
pub struct CustomerFields {
    #[arg(long)]
    party_name: Option<String>,
    #[arg(long)]
    shortname: Option<String>,
    #[arg(long)]
    address1: Option<String>,
    #[arg(long)]
    address2: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone1: Option<String>,
    #[arg(long)]
    phone2: Option<String>,
    #[arg(long)]
    status: Option<String>,
}

impl CustomerFields {
    /// Overlay the given fields onto `input`.
    fn apply(self, mut input: CustomerInput) -> CustomerInput {
        let fields = [
            (self.party_name, &mut input.party_name),
            (self.shortname, &mut input.shortname),
            (self.address1, &mut input.address1),
            (self.address2, &mut input.address2),
            (self.city, &mut input.city),
            (self.country, &mut input.country),
            (self.email, &mut input.email),
            (self.phone1, &mut input.phone1),
            (self.phone2, &mut input.phone2),
            (self.status, &mut input.status),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        input
    }
}

#[derive(Subcommand)]
pub enum CustomerCommand {
    List(CustomerFilter),
    /// Distinct countries across all customers
    Countries,
    Add(CustomerFields),
    Edit {
        id: RecordId,
        #[command(flatten)]
        fields: CustomerFields,
    },
    Delete {
        id: RecordId,
    },
    /// Preview and upload an .xlsx spreadsheet of customers
    Import {
        file: PathBuf,
        /// Show the preview without uploading
        #[arg(long)]
        dry_run: bool,
    },
    /// Write the (filtered) customer list as CSV or XLSX
    Export {
        #[command(flatten)]
        filter: CustomerFilter,
        /// csv or xlsx
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Output file (default: customers_<date>.<format>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Members of your department
    Department,
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "user")]
        role: Role,
        #[arg(long)]
        department: Option<RecordId>,
        /// Defaults to the department's only manager, if it has exactly one
        #[arg(long)]
        manager: Option<RecordId>,
        /// Read the password from the first line of stdin (default: CRM_PASSWORD)
        #[arg(long)]
        password_stdin: bool,
    },
    SetRole {
        id: RecordId,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        department: Option<RecordId>,
        #[arg(long)]
        manager: Option<RecordId>,
    },
    Delete {
        id: RecordId,
    },
}

#[derive(Subcommand)]
pub enum DepartmentCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Delete {
        id: RecordId,
    },
}

#[derive(Subcommand)]
pub enum MailCommand {
    /// One personalized mail per customer; `{placeholders}` are filled in
    Send {
        #[arg(long)]
        subject: String,
        /// Markdown body file
        #[arg(long)]
        body: PathBuf,
        /// Recipient customer id (repeatable)
        #[arg(long = "customer")]
        customers: Vec<RecordId>,
        /// Send to every customer
        #[arg(long, conflicts_with = "customers")]
        all: bool,
        /// File to attach (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
}

/// Read one line of stdin (`count` lines when confirming), or fall back to
/// `CRM_PASSWORD`.
fn read_passwords(from_stdin: bool, count: usize) -> Result<Vec<Secret<String>>> {
    if from_stdin {
        let stdin = std::io::stdin();
        let mut lines = Vec::with_capacity(count);
        for line in stdin.lock().lines().take(count) {
            let line = line.context("failed to read password from stdin")?;
            lines.push(Secret::new(line.trim_end_matches(['\r', '\n']).to_owned()));
        }
        if lines.len() < count {
            bail!("expected {count} line(s) on stdin");
        }
        return Ok(lines);
    }
    let password = std::env::var("CRM_PASSWORD")
        .map_err(|_| anyhow!("no password given: use --password-stdin or set CRM_PASSWORD"))?;
    Ok(vec![Secret::new(password); count])
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into())
}

/// Rows of the import preview shown before uploading.
const PREVIEW_ROWS: usize = 10;

fn print_preview(preview: &WorkbookPreview) {
    println!("Sheets: {}", preview.sheet_names.join(", "));
    if let Some(sheet) = preview.first_sheet() {
        println!("Reading \"{sheet}\": {} data row(s)", preview.rows.len());
    }
    println!("{}", preview.headers.join(" | "));
    for row in preview.rows.iter().take(PREVIEW_ROWS) {
        println!("{}", row.join(" | "));
    }
    if preview.rows.len() > PREVIEW_ROWS {
        println!("... {} more", preview.rows.len() - PREVIEW_ROWS);
    }
}

fn print_customer(c: &Customer) {
    let id = c.id.as_ref().map(ToString::to_string).unwrap_or_default();
    println!(
        "{id:>6}  {:<30}  {:<28}  {:<16}  {:<16}  {}",
        c.party_name,
        c.email(),
        c.city(),
        c.country(),
        c.status()
    );
}

impl Commands {
    fn is_protected(&self) -> bool {
        !matches!(
            self,
            Commands::Login { .. } | Commands::Logout | Commands::Status | Commands::Preview { .. }
        )
    }

    pub async fn execute(self, app: &App) -> Result<()> {
        if self.is_protected() {
            app.require_session()?;
        }
        let api = &app.api;

        match self {
            Commands::Login {
                email,
                password_stdin,
            } => login(app, &email, password_stdin).await?,
            Commands::Logout => {
                clear_session(app.session.as_ref()).context("failed to clear session")?;
                println!("Signed out.");
            }
            Commands::Status => match check_route(app.session.as_ref()) {
                GuardDecision::Allow => println!(
                    "Session stored at {} ({})",
                    app.config.session.path.display(),
                    app.config.base_url()
                ),
                GuardDecision::Redirect(route) => println!("Not signed in (login: {route})"),
            },
            Commands::Preview { body } => {
                let markdown = tokio::fs::read_to_string(&body)
                    .await
                    .with_context(|| format!("failed to read {}", body.display()))?;
                println!("{}", MarkdownRenderer::new()?.render(&markdown));
            }
            Commands::Me => {
                let me = api.me().await.context("failed to fetch current user")?;
                println!("{} <{}> ({})", me.username, me.email, me.role);
            }
            Commands::Profile {
                username,
                email,
                password_stdin,
            } => {
                let (password, confirm_password) = if password_stdin {
                    let mut lines = read_passwords(true, 2)?.into_iter();
                    (lines.next(), lines.next())
                } else {
                    (None, None)
                };
                let update = ProfileUpdate {
                    username,
                    email,
                    password,
                    confirm_password,
                };
                api.update_me(&update)
                    .await
                    .map_err(|e| anyhow!(e.user_message("Failed to update profile")))?;
                println!("Profile updated.");
            }
            Commands::Customers(cmd) => customers(api, cmd).await?,
            Commands::Users(cmd) => users(api, cmd).await?,
            Commands::Departments(cmd) => departments(api, cmd).await?,
            Commands::Mail(cmd) => mail(api, cmd).await?,
            Commands::History { search, kind } => {
                let messages = api
                    .message_history()
                    .await
                    .context("failed to fetch message history")?;
                let query = MessageQuery {
                    search,
                    kind,
                    ..Default::default()
                };
                for m in query.apply(&messages) {
                    println!(
                        "{:<25}  {:<8}  {:<20}  {:<24}  {}",
                        m.created_at.as_deref().unwrap_or("N/A"),
                        m.kind.as_deref().unwrap_or(""),
                        m.sender(),
                        m.recipient_name(),
                        m.subject.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Ok(())
    }
}

async fn login(app: &App, email: &str, password_stdin: bool) -> Result<()> {
    let password = read_passwords(password_stdin, 1)?
        .pop()
        .ok_or_else(|| anyhow!("no password given"))?;
    if password.is_blank() {
        bail!("Email and password are required");
    }
    let client = app.api.client();
    let pair = crm_auth::login(
        client.token_http(),
        client.base_url(),
        email,
        password.expose(),
    )
    .await
    .context("login failed")?;
    // A previous session's refresh token must not outlive this login
    clear_session(app.session.as_ref()).context("failed to persist session")?;
    store_pair(app.session.as_ref(), &pair).context("failed to persist session")?;
    info!(email, "signed in");
    app.navigator.navigate(DASHBOARD_ROUTE);
    println!("Signed in as {email}.");
    Ok(())
}

async fn customers(api: &CrmApi, cmd: CustomerCommand) -> Result<()> {
    match cmd {
        CustomerCommand::List(filter) => {
            let all = api.customers().await.context("failed to fetch customers")?;
            for c in filter.query()?.apply(&all) {
                print_customer(&c);
            }
        }
        CustomerCommand::Countries => {
            let all = api.customers().await.context("failed to fetch customers")?;
            for country in countries(&all) {
                println!("{country}");
            }
        }
        CustomerCommand::Add(fields) => {
            if fields.party_name.as_deref().is_none_or(str::is_empty) {
                bail!("--party-name is required");
            }
            let input = fields.apply(CustomerInput::default());
            let created = api
                .create_customer(&input)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to create customer")))?;
            print_customer(&created);
        }
        CustomerCommand::Edit { id, fields } => {
            let all = api.customers().await.context("failed to fetch customers")?;
            let existing = all
                .iter()
                .find(|c| c.id.as_ref() == Some(&id))
                .ok_or_else(|| anyhow!("no customer with id {id}"))?;
            let input = fields.apply(CustomerInput::from(existing));
            api.update_customer(&id, &input)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to update customer")))?;
            println!("Customer {id} updated.");
        }
        CustomerCommand::Delete { id } => {
            api.delete_customer(&id)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to delete customer")))?;
            println!("Customer {id} deleted.");
        }
        CustomerCommand::Import { file, dry_run } => {
            let contents = read_file(&file).await?;
            let import = ImportFile::read(file_name(&file), contents).map_err(|_| {
                anyhow!("Failed to read Excel file. Ensure it's a valid .xlsx/.xls file.")
            })?;
            print_preview(&import.preview);
            if dry_run {
                return Ok(());
            }
            let count = api.import_file(&import).await.map_err(|e| {
                anyhow!(e.user_message(
                    "Failed to import customers. Please check the file format and try again."
                ))
            })?;
            println!("Successfully imported {count} customers");
        }
        CustomerCommand::Export {
            filter,
            format,
            output,
        } => {
            let all = api.customers().await.context("failed to fetch customers")?;
            let selected = filter.query()?.apply(&all);
            let contents = match format {
                ExportFormat::Csv => customers_csv(&selected).map(String::into_bytes),
                ExportFormat::Xlsx => customers_xlsx(&selected)?,
            };
            let Some(contents) = contents else {
                bail!("No customers to export");
            };
            let output = output.unwrap_or_else(|| {
                let today = chrono::Local::now().format("%Y-%m-%d").to_string();
                PathBuf::from(export_file_name(&today, format))
            });
            tokio::fs::write(&output, contents)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Exported {} customers to {}", selected.len(), output.display());
        }
    }
    Ok(())
}

async fn users(api: &CrmApi, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::List { search, role } => {
            let all = api.users().await.context("failed to fetch users")?;
            let query = UserQuery {
                search,
                role,
                ..Default::default()
            };
            for u in query.apply(&all) {
                let id = u.id.as_ref().map(ToString::to_string).unwrap_or_default();
                println!("{id:>6}  {:<20}  {:<30}  {}", u.username, u.email, u.role);
            }
        }
        UserCommand::Department => {
            for u in api
                .department_users()
                .await
                .context("failed to fetch department users")?
            {
                println!("{:<20}  {:<30}  {}", u.username, u.email, u.role);
            }
        }
        UserCommand::Add {
            username,
            name,
            email,
            role,
            department,
            manager,
            password_stdin,
        } => {
            let password = read_passwords(password_stdin, 1)?
                .pop()
                .ok_or_else(|| anyhow!("no password given"))?;
            let manager = match (&department, manager) {
                (Some(dept), None) if role.has_manager() => {
                    let all = api.users().await.context("failed to fetch users")?;
                    sole_manager(&all, dept).cloned()
                }
                (_, manager) => manager,
            };
            let created = api
                .create_user(&NewUser {
                    username,
                    name,
                    email,
                    password,
                    role,
                    department_id: department,
                    manager_id: manager,
                })
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to create user. Please try again.")))?;
            println!("Created user {} ({})", created.username, created.role);
        }
        UserCommand::SetRole {
            id,
            role,
            department,
            manager,
        } => {
            api.update_user(
                &id,
                &RoleAssignment {
                    role,
                    department_id: department,
                    manager_id: manager,
                },
            )
            .await
            .map_err(|e| anyhow!(e.user_message("Failed to update user role")))?;
            println!("User {id} is now {role}.");
        }
        UserCommand::Delete { id } => {
            api.delete_user(&id)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to delete user")))?;
            println!("User {id} deleted.");
        }
    }
    Ok(())
}

async fn departments(api: &CrmApi, cmd: DepartmentCommand) -> Result<()> {
    match cmd {
        DepartmentCommand::List => {
            for d in api
                .departments()
                .await
                .context("failed to fetch departments")?
            {
                let id = d.id.as_ref().map(ToString::to_string).unwrap_or_default();
                println!(
                    "{id:>6}  {:<24}  {}",
                    d.name,
                    d.description.as_deref().unwrap_or("")
                );
            }
        }
        DepartmentCommand::Add { name, description } => {
            let created = api
                .create_department(&NewDepartment { name, description })
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to create department")))?;
            println!("Created department {}", created.name);
        }
        DepartmentCommand::Delete { id } => {
            api.delete_department(&id)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to delete department")))?;
            println!("Department {id} deleted.");
        }
    }
    Ok(())
}

async fn mail(api: &CrmApi, cmd: MailCommand) -> Result<()> {
    let MailCommand::Send {
        subject,
        body,
        customers,
        all,
        attachments,
    } = cmd;

    if customers.is_empty() && !all {
        bail!("Please select at least one customer to send the email to.");
    }

    let body = tokio::fs::read_to_string(&body)
        .await
        .with_context(|| format!("failed to read {}", body.display()))?;
    let subject = Template::new(subject)?;
    let body = Template::new(body)?;
    for name in subject
        .unknown_placeholders()
        .into_iter()
        .chain(body.unknown_placeholders())
    {
        eprintln!("warning: {{{name}}} is not a known placeholder and will be sent as written");
    }

    let mut files = Vec::with_capacity(attachments.len());
    for path in &attachments {
        files.push(FilePart::new(file_name(path), read_file(path).await?));
    }

    let everyone = api.customers().await.context("failed to fetch customers")?;
    let recipients: Vec<Customer> = if all {
        everyone
    } else {
        everyone
            .into_iter()
            .filter(|c| c.id.as_ref().is_some_and(|id| customers.contains(id)))
            .collect()
    };
    if recipients.is_empty() {
        bail!("none of the selected customers exist");
    }

    let report = send_personalized(api, &subject, &body, &recipients, &files).await;
    for failure in &report.failed {
        eprintln!("  {}: {}", failure.customer, failure.reason);
    }
    if !report.is_clean() {
        bail!("{}", report.summary());
    }
    println!("{}", report.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BASE_URL_ENV;
    use crate::config::tests::{ENV_MUTEX, remove_env, set_env};
    use crm_auth::{SessionKey, SessionStore};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(server: &MockServer, dir: &tempfile::TempDir) -> App {
        let config_path = dir.path().join("crm-console.toml");
        std::fs::write(
            &config_path,
            format!(
                "[api]\norigin = \"{}\"\n\n[session]\npath = \"{}\"\n",
                server.uri(),
                dir.path().join("session.json").display()
            ),
        )
        .unwrap();
        let config = {
            let _lock = ENV_MUTEX.lock().unwrap();
            unsafe { remove_env(BASE_URL_ENV) };
            Config::load(&config_path).unwrap()
        };
        App::new(config).unwrap()
    }

    #[tokio::test]
    async fn protected_command_without_session_redirects_to_login() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);

        let result = Commands::Me.execute(&app).await;

        assert!(result.is_err());
        assert!(app.navigator.session_ended());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_persists_token_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .and(body_json(json!({"email": "admin@crm.test", "password": "hunter22"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "A1",
                "refreshToken": "R1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);
        app.session.set(SessionKey::RefreshToken, "stale").unwrap();

        {
            let _lock = ENV_MUTEX.lock().unwrap();
            unsafe { set_env("CRM_PASSWORD", "hunter22") };
        }
        let result = Commands::Login {
            email: "admin@crm.test".into(),
            password_stdin: false,
        }
        .execute(&app)
        .await;
        {
            let _lock = ENV_MUTEX.lock().unwrap();
            unsafe { remove_env("CRM_PASSWORD") };
        }
        result.unwrap();

        let reopened = FileSessionStore::load(dir.path().join("session.json")).unwrap();
        assert_eq!(reopened.get(SessionKey::AccessToken).as_deref(), Some("A1"));
        assert_eq!(reopened.get(SessionKey::RefreshToken).as_deref(), Some("R1"));
        assert!(!app.navigator.session_ended());
    }

    #[tokio::test]
    async fn export_writes_filtered_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "customers": [
                    {"id": 1, "partyName": "Acme", "country": "France"},
                    {"id": 2, "partyName": "Globex", "country": "Spain"}
                ]
            })))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);
        app.session.set(SessionKey::AccessToken, "A1").unwrap();
        let output = dir.path().join("out.csv");

        Commands::Customers(CustomerCommand::Export {
            filter: CustomerFilter {
                country: Some("France".into()),
                sort: "name".into(),
                ..Default::default()
            },
            format: ExportFormat::Csv,
            output: Some(output.clone()),
        })
        .execute(&app)
        .await
        .unwrap();

        let csv = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Company Name,"));
        assert!(lines[1].starts_with("Acme,"));
    }

    #[tokio::test]
    async fn export_writes_customers_workbook() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "customers": [{"id": 1, "partyName": "Acme", "email": "ops@acme.test"}]
            })))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);
        app.session.set(SessionKey::AccessToken, "A1").unwrap();
        let output = dir.path().join("out.xlsx");

        Commands::Customers(CustomerCommand::Export {
            filter: CustomerFilter {
                sort: "name".into(),
                ..Default::default()
            },
            format: ExportFormat::Xlsx,
            output: Some(output.clone()),
        })
        .execute(&app)
        .await
        .unwrap();

        let preview = crm_api::read_workbook(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(preview.first_sheet(), Some("Customers"));
        assert_eq!(preview.rows[0][0], "Acme");
        assert_eq!(preview.rows[0][6], "ops@acme.test");
    }

    #[tokio::test]
    async fn import_dry_run_reads_without_uploading() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/customers/import"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);
        app.session.set(SessionKey::AccessToken, "A1").unwrap();

        let workbook = dir.path().join("customers.xlsx");
        let customers = vec![Customer {
            party_name: "Acme".into(),
            ..Default::default()
        }];
        std::fs::write(&workbook, customers_xlsx(&customers).unwrap().unwrap()).unwrap();

        Commands::Customers(CustomerCommand::Import {
            file: workbook,
            dry_run: true,
        })
        .execute(&app)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn import_rejects_files_that_are_not_workbooks() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);
        app.session.set(SessionKey::AccessToken, "A1").unwrap();
        let file = dir.path().join("customers.xlsx");
        std::fs::write(&file, "name,email\n").unwrap();

        let err = Commands::Customers(CustomerCommand::Import {
            file,
            dry_run: false,
        })
        .execute(&app)
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("Failed to read Excel file"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_export_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"customers": []})))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&server, &dir);
        app.session.set(SessionKey::AccessToken, "A1").unwrap();
        let output = dir.path().join("out.csv");

        let err = Commands::Customers(CustomerCommand::Export {
            filter: CustomerFilter {
                sort: "name".into(),
                ..Default::default()
            },
            format: ExportFormat::Csv,
            output: Some(output.clone()),
        })
        .execute(&app)
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "No customers to export");
        assert!(!output.exists());
    }

    #[test]
    fn customer_fields_overlay_only_given_values() {
        let base = CustomerInput {
            party_name: "Acme".into(),
            email: "old@acme.test".into(),
            city: "Lyon".into(),
            ..Default::default()
        };
        let fields = CustomerFields {
            email: Some("new@acme.test".into()),
            ..Default::default()
        };
        let input = fields.apply(base);
        assert_eq!(input.party_name, "Acme");
        assert_eq!(input.email, "new@acme.test");
        assert_eq!(input.city, "Lyon");
    }

    #[test]
    fn customer_filter_sort_names() {
        let filter = CustomerFilter {
            sort: "country".into(),
            desc: true,
            ..Default::default()
        };
        let query = filter.query().unwrap();
        assert_eq!(query.sort, CustomerSort::Country);
        assert_eq!(query.order, SortOrder::Desc);

        let bad = CustomerFilter {
            sort: "revenue".into(),
            ..Default::default()
        };
        assert!(bad.query().is_err());
    }

    #[test]
    fn file_name_from_path() {
        assert_eq!(file_name(Path::new("/tmp/customers.xlsx")), "customers.xlsx");
    }
}
