use std::path::PathBuf;

use thiserror::Error;

/// A collaborator could not list templates, recipients or related records.
#[derive(Debug, Error)]
pub(crate) enum SourceError {
    #[error("falha ao ler {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("arquivo inválido {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("busca interrompida: {0}")]
    Worker(String),
}

/// Reasons a message is not handed to the dispatch channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DispatchError {
    #[error("nenhum modelo selecionado")]
    NoTemplate,

    #[error("nenhum cliente selecionado")]
    NoRecipient,

    #[error("o cliente não possui telefone válido")]
    NoContactAddress,

    #[error("campos não preenchidos: {}", .missing.join(", "))]
    Incomplete { missing: Vec<String> },

    #[error("falha ao abrir o canal de envio: {0}")]
    Channel(String),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("falha ao ler {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuração inválida {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("regra de campo inválida `{key}`: {reason}")]
    InvalidRule { key: String, reason: String },

    #[error("regras conflitantes para `{key}`: já classificado como {existing}")]
    ConflictingRule { key: String, existing: String },

    #[error("não foi possível localizar o diretório do usuário")]
    NoHomeDir,
}
