//! Blocking SSH session used for remote command execution

use nodeinfra_core_dispatch::{DispatchError, Target};
use secrecy::{ExposeSecret, SecretString};
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::HarnessConfig;

/// SSH authentication method
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Password authentication
    Password(SecretString),

    /// Public key authentication with private key file
    KeyFile {
        /// Path to private key file
        key_path: PathBuf,
        /// Optional passphrase for the key
        passphrase: Option<SecretString>,
    },

    /// SSH agent authentication
    Agent,
}

/// Everything needed to open a session to one host
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
    pub timeout: Duration,
}

impl SessionConfig {
    /// Session settings for `target`
    ///
    /// A target password wins, then the configured key file, then the agent.
    pub fn for_target(target: &Target, config: &HarnessConfig) -> Self {
        let auth = if target.has_password() {
            SshAuth::Password(target.password.clone())
        } else if let Some(key) = &config.ssh_key {
            SshAuth::KeyFile {
                key_path: key.clone(),
                passphrase: None,
            }
        } else {
            SshAuth::Agent
        };

        Self {
            host: target.address.clone(),
            port: config.ssh_port,
            username: target.username.clone(),
            auth,
            timeout: config.connect_timeout(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// An authenticated SSH session to one host
pub struct ShellSession {
    address: String,
    session: Session,
}

impl ShellSession {
    /// Connect, handshake and authenticate
    pub fn connect(config: &SessionConfig) -> Result<Self, DispatchError> {
        let endpoint = config.endpoint();
        let unreachable = |reason: String| DispatchError::Unreachable {
            address: config.host.clone(),
            reason,
        };

        let addr = endpoint
            .to_socket_addrs()
            .map_err(|e| unreachable(format!("cannot resolve {}: {}", endpoint, e)))?
            .next()
            .ok_or_else(|| unreachable(format!("no address for {}", endpoint)))?;

        let tcp = TcpStream::connect_timeout(&addr, config.timeout)
            .map_err(|e| unreachable(format!("connect to {} failed: {}", endpoint, e)))?;
        tcp.set_read_timeout(Some(config.timeout)).ok();
        tcp.set_write_timeout(Some(config.timeout)).ok();

        let mut session = Session::new().map_err(|e| transport(&config.host, "create session", e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(config.timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| transport(&config.host, "handshake", e))?;

        authenticate(&session, config)?;

        if !session.authenticated() {
            return Err(DispatchError::AuthenticationFailed {
                address: config.host.clone(),
                reason: "server did not accept credentials".to_string(),
            });
        }

        debug!("SSH session established to {}", endpoint);
        Ok(Self {
            address: config.host.clone(),
            session,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run `command` and collect its output
    pub fn exec(&self, command: &str) -> Result<CommandOutput, DispatchError> {
        trace!(address = %self.address, command, "exec");
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| transport(&self.address, "open channel", e))?;
        channel
            .exec(command)
            .map_err(|e| transport(&self.address, "exec", e))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| transport(&self.address, "read stdout", e))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| transport(&self.address, "read stderr", e))?;

        channel
            .wait_close()
            .map_err(|e| transport(&self.address, "close channel", e))?;
        let exit_status = channel
            .exit_status()
            .map_err(|e| transport(&self.address, "exit status", e))?;

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.session.disconnect(None, "closing", None).ok();
        debug!("SSH session to {} closed", self.address);
    }
}

fn authenticate(session: &Session, config: &SessionConfig) -> Result<(), DispatchError> {
    let auth_failed = |reason: String| DispatchError::AuthenticationFailed {
        address: config.host.clone(),
        reason,
    };

    match &config.auth {
        SshAuth::Password(password) => session
            .userauth_password(&config.username, password.expose_secret())
            .map_err(|e| auth_failed(format!("password authentication failed: {}", e))),
        SshAuth::KeyFile {
            key_path,
            passphrase,
        } => {
            let pass: Option<&str> = passphrase.as_ref().map(|p| p.expose_secret());
            session
                .userauth_pubkey_file(&config.username, None, key_path, pass)
                .map_err(|e| auth_failed(format!("key file authentication failed: {}", e)))
        }
        SshAuth::Agent => {
            let mut agent = session
                .agent()
                .map_err(|e| auth_failed(format!("failed to connect to SSH agent: {}", e)))?;
            agent
                .connect()
                .map_err(|e| auth_failed(format!("failed to connect to SSH agent: {}", e)))?;
            agent
                .list_identities()
                .map_err(|e| auth_failed(format!("failed to list SSH agent identities: {}", e)))?;
            let identities = agent
                .identities()
                .map_err(|e| auth_failed(format!("failed to get SSH agent identities: {}", e)))?;

            if identities
                .iter()
                .any(|identity| agent.userauth(&config.username, identity).is_ok())
            {
                Ok(())
            } else {
                Err(auth_failed("no valid identity found in SSH agent".to_string()))
            }
        }
    }
}

fn transport(address: &str, step: &str, err: impl std::fmt::Display) -> DispatchError {
    DispatchError::Transport {
        address: address.to_string(),
        reason: format!("{}: {}", step, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_target_uses_password_auth() {
        let target = Target::new("10.0.0.1", "root", "secret");
        let config = SessionConfig::for_target(&target, &HarnessConfig::default());
        assert!(matches!(config.auth, SshAuth::Password(_)));
        assert_eq!(config.port, 22);
        assert_eq!(config.endpoint(), "10.0.0.1:22");
    }

    #[test]
    fn test_key_file_when_no_password() {
        let target = Target::new("10.0.0.1", "root", "");
        let harness = HarnessConfig {
            ssh_key: Some(PathBuf::from("/keys/id_rsa")),
            ssh_port: 2222,
            ..Default::default()
        };
        let config = SessionConfig::for_target(&target, &harness);
        match config.auth {
            SshAuth::KeyFile { key_path, .. } => {
                assert_eq!(key_path, PathBuf::from("/keys/id_rsa"))
            }
            other => panic!("unexpected auth {:?}", other),
        }
        assert_eq!(config.port, 2222);
    }

    #[test]
    fn test_agent_as_last_resort() {
        let target = Target::new("10.0.0.1", "root", "");
        let config = SessionConfig::for_target(&target, &HarnessConfig::default());
        assert!(matches!(config.auth, SshAuth::Agent));
    }

    #[test]
    fn test_refused_connection_is_unreachable() {
        let config = SessionConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "root".to_string(),
            auth: SshAuth::Agent,
            timeout: Duration::from_millis(200),
        };
        let err = ShellSession::connect(&config).err().unwrap();
        assert!(matches!(err, DispatchError::Unreachable { .. }));
        assert!(err.is_retriable());
    }

    #[test]
    fn test_command_output_success() {
        let ok = CommandOutput::default();
        assert!(ok.success());
        let failed = CommandOutput {
            exit_status: 127,
            ..Default::default()
        };
        assert!(!failed.success());
    }
}
