//! Lints files on disk with the same resolver, ignore set and engine as the
//! language server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::{IntoDiagnostic, Result, miette};
use tracing::{debug, info};
use url::Url;

use mdguard_core::invoker::LintContext;
use mdguard_core::{
    BuiltinEngine, ConfigEntry, ConfigResolver, Document, IgnoreMatcher, IgnoreSet,
    IgnoreSetting, LintInvoker, NativeFs, OutputLog, RuleViolation, Settings, WorkspaceFolder,
    WorkspaceFolders,
};

/// Ignore file read from the working directory.
pub const IGNORE_FILE: &str = ".markdownlintignore";

/// Violations of one file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub document: Document,
    pub violations: Vec<RuleViolation>,
}

pub struct WorkspaceLinter {
    workspace: WorkspaceFolders,
    resolver: ConfigResolver,
    explicit: Option<Arc<ConfigEntry>>,
    invoker: LintInvoker,
    ignores: IgnoreSet,
    settings: Settings,
}

impl WorkspaceLinter {
    /// Linter rooted at `root`; `config` replaces config file discovery.
    pub async fn new(root: &Path, config: Option<&Path>) -> Result<Self> {
        let output = Arc::new(OutputLog::new(None));
        let resolver = ConfigResolver::new().with_output(Arc::clone(&output));
        let explicit = match config {
            Some(path) => {
                info!("Using config: {}", path.display());
                Some(resolver.load_explicit(&NativeFs, path).await.into_diagnostic()?)
            }
            None => None,
        };

        let setting = IgnoreSetting::File(IGNORE_FILE.to_string());
        let contents = match tokio::fs::read_to_string(root.join(IGNORE_FILE)).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).into_diagnostic(),
        };
        let ignores = IgnoreMatcher::compile(&setting, contents.as_deref());

        let folder = WorkspaceFolder::from_path(root)
            .ok_or_else(|| miette!("Not an absolute directory: {}", root.display()))?;

        Ok(Self {
            workspace: WorkspaceFolders::new(vec![folder]),
            resolver,
            explicit,
            invoker: LintInvoker::new(Arc::new(BuiltinEngine), output),
            ignores,
            settings: Settings {
                ignore: setting,
                ..Settings::default()
            },
        })
    }

    pub async fn lint_file(&self, path: &Path) -> Result<FileReport> {
        let text = tokio::fs::read_to_string(path).await.into_diagnostic()?;
        let uri = Url::from_file_path(path)
            .map_err(|_| miette!("Not an absolute path: {}", path.display()))?;
        let document = Document::new(uri, text, "markdown", 0);
        let violations = self.lint_document(&document).await;
        Ok(FileReport {
            path: path.to_path_buf(),
            document,
            violations,
        })
    }

    pub async fn lint_document(&self, document: &Document) -> Vec<RuleViolation> {
        let folder = self.workspace.folder_for(&document.uri);
        let entry = match &self.explicit {
            Some(entry) => Arc::clone(entry),
            None => {
                self.resolver
                    .resolve(&NativeFs, document, folder, &self.settings)
                    .await
            }
        };
        let relative_path = self.workspace.relative_path(document);
        debug!("Linting {}", relative_path);

        self.invoker
            .invoke(
                document,
                LintContext {
                    relative_path: &relative_path,
                    config: &entry,
                    custom_rules: Arc::from(Vec::new()),
                    ignores: &self.ignores,
                    plugins: Vec::new(),
                },
            )
            .await
    }
}
