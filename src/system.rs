use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use arboard::Clipboard;
use env_logger::{Env, Target};

use crate::error::ConfigError;

pub(crate) const SETTINGS_FILE: &str = "settings.toml";
pub(crate) const TEMPLATES_FILE: &str = "templates.md";
pub(crate) const DIRECTORY_FILE: &str = "clientes.toml";
const LOG_FILE: &str = "recado.log";

const DEFAULT_TEMPLATES: &str = "## Processos/Atualização de status (padrão)\nOlá [nome_cliente], seu processo [numero_processo] está [status_processo].\n\n## Processos/Audiência marcada\nOlá [nome_cliente], a audiência do processo [numero_processo] foi marcada para [data_audiencia]. [observacao]\n\n## Geral/Boas-vindas\nOlá [nome_cliente], seja bem-vindo(a)! Qualquer dúvida, estamos à disposição.\n";

const DEFAULT_DIRECTORY: &str = "[[clients]]\nid = \"1\"\nname = \"Maria Souza\"\nphone = \"(11) 91234-5678\"\n\n[[cases]]\nid = \"1\"\nclient_id = \"1\"\nnumber = \"123/2024\"\ntitle = \"Ação de cobrança\"\nstatus = \"Em Andamento\"\n";

/// Directory holding settings, templates, clients and the log.
pub(crate) fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env::var_os("RECADO_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = env::var_os("USERPROFILE")
        .or_else(|| env::var_os("HOME"))
        .map(PathBuf::from)
        .ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".config").join("recado"))
}

/// Creates any missing data file with its sample content.
pub(crate) fn ensure_data_files(dir: &Path, default_settings: &str) -> Result<(), ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let defaults = [
        (SETTINGS_FILE, default_settings),
        (TEMPLATES_FILE, DEFAULT_TEMPLATES),
        (DIRECTORY_FILE, DEFAULT_DIRECTORY),
    ];
    for (name, content) in defaults {
        let path = dir.join(name);
        if path.exists() {
            continue;
        }
        fs::write(&path, content).map_err(|source| ConfigError::Io { path, source })?;
    }
    Ok(())
}

/// Sends log output to a file next to the data files; the terminal belongs to the UI.
pub(crate) fn init_logging(dir: &Path, level: &str) -> Result<(), ConfigError> {
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| ConfigError::Io { path, source })?;
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .ok();
    Ok(())
}

pub(crate) fn set_clipboard(text: &str) -> Result<(), String> {
    Clipboard::new()
        .and_then(|mut cb| cb.set_text(text.to_string()))
        .map_err(|err| format!("falha ao copiar: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_SETTINGS, Settings};
    use crate::sources::{DirectoryFile, MarkdownTemplateSource, RecipientSource, TemplateSource};

    #[test]
    fn first_run_writes_usable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        ensure_data_files(dir.path(), DEFAULT_SETTINGS).unwrap();

        let settings = Settings::load_from_path(&dir.path().join(SETTINGS_FILE)).unwrap();
        settings.build_classifier().unwrap();
        let templates = MarkdownTemplateSource::new(dir.path().join(TEMPLATES_FILE))
            .list_templates()
            .unwrap();
        assert_eq!(templates.len(), 3);
        assert!(templates[0].is_default);
        let recipients = DirectoryFile::new(dir.path().join(DIRECTORY_FILE))
            .list_recipients()
            .unwrap();
        assert_eq!(recipients[0].display_name, "Maria Souza");
    }

    #[test]
    fn existing_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TEMPLATES_FILE);
        fs::write(&path, "## Meu modelo\nOi").unwrap();
        ensure_data_files(dir.path(), DEFAULT_SETTINGS).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "## Meu modelo\nOi");
    }
}
