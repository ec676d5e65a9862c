//! Scripted stand-ins for the batch collaborators.

use signtool_batch::adapters::{
    CertificateChooser, CertificateStore, ConfirmGate, ProcessInvoker, ToolLocator,
};
use signtool_batch::domain::InvocationOutput;
use signtool_batch::{Certificate, SignerInvocation, SigningError, SigningTarget, Thumbprint};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

pub fn certificate(hex_byte: &str, subject: &str) -> Certificate {
    Certificate::new(Thumbprint::new(hex_byte.repeat(20)).unwrap(), subject)
}

pub fn targets(names: &[&str]) -> Vec<SigningTarget> {
    names.iter().map(|n| SigningTarget::unchecked(*n)).collect()
}

/// Locator that either has the tool or does not
pub struct FixedLocator(pub Option<PathBuf>);

impl FixedLocator {
    pub fn present() -> Self {
        Self(Some(PathBuf::from("C:/SDK/bin/10.0.22621.0/x64/signtool.exe")))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl ToolLocator for FixedLocator {
    fn locate(&self) -> signtool_batch::Result<PathBuf> {
        self.0.clone().ok_or(SigningError::ToolNotFound {
            searched: vec![PathBuf::from("C:/Program Files (x86)/Windows Kits/10")],
        })
    }
}

/// Store with a fixed certificate list that counts queries
#[derive(Default)]
pub struct FixedStore {
    pub certificates: Vec<Certificate>,
    pub queries: Cell<usize>,
}

impl FixedStore {
    pub fn with(certificates: Vec<Certificate>) -> Self {
        Self {
            certificates,
            queries: Cell::new(0),
        }
    }
}

impl CertificateStore for FixedStore {
    fn code_signing_certificates(&self) -> signtool_batch::Result<Vec<Certificate>> {
        self.queries.set(self.queries.get() + 1);
        Ok(self.certificates.clone())
    }
}

/// Outcome scripted for one file name
#[derive(Clone)]
pub enum Scripted {
    Exit { code: i32, stderr: String },
    LaunchError,
}

/// Process invoker answering by target file name; unknown files exit 0
#[derive(Default)]
pub struct ScriptedInvoker {
    script: HashMap<String, Scripted>,
    pub launched: RefCell<Vec<SignerInvocation>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn exit(mut self, file: &str, code: i32, stderr: &str) -> Self {
        self.script.insert(
            file.to_string(),
            Scripted::Exit {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    #[must_use]
    pub fn launch_error(mut self, file: &str) -> Self {
        self.script.insert(file.to_string(), Scripted::LaunchError);
        self
    }

    /// Target paths in launch order
    pub fn launched_targets(&self) -> Vec<String> {
        self.launched
            .borrow()
            .iter()
            .filter_map(|inv| inv.args().last())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

impl ProcessInvoker for ScriptedInvoker {
    fn run(&self, invocation: &SignerInvocation) -> io::Result<InvocationOutput> {
        self.launched.borrow_mut().push(invocation.clone());
        let target = invocation
            .args()
            .last()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.script.get(&target) {
            Some(Scripted::LaunchError) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Access is denied.",
            )),
            Some(Scripted::Exit { code, stderr }) => Ok(InvocationOutput {
                exit_code: Some(*code),
                stdout: String::new(),
                stderr: stderr.clone(),
                timed_out: false,
            }),
            None => Ok(InvocationOutput {
                exit_code: Some(0),
                stdout: format!("Successfully signed: {target}\n"),
                stderr: String::new(),
                timed_out: false,
            }),
        }
    }
}

/// Chooser with a fixed answer that counts prompts
pub struct CountingChooser {
    pub answer: Option<usize>,
    pub prompts: usize,
}

impl CountingChooser {
    pub fn answering(answer: Option<usize>) -> Self {
        Self { answer, prompts: 0 }
    }
}

impl CertificateChooser for CountingChooser {
    fn choose(&mut self, _candidates: &[Certificate]) -> Option<usize> {
        self.prompts += 1;
        self.answer
    }
}

/// Gate answering from a list, one entry per asked file
pub struct ScriptedGate {
    answers: Vec<bool>,
    pub asked: Vec<PathBuf>,
}

impl ScriptedGate {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.to_vec(),
            asked: Vec::new(),
        }
    }
}

impl ConfirmGate for ScriptedGate {
    fn confirm(&mut self, target: &SigningTarget) -> bool {
        let answer = self.answers.get(self.asked.len()).copied().unwrap_or(false);
        self.asked.push(target.path().to_path_buf());
        answer
    }
}
