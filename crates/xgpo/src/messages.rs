use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use xgpo_core::AdmissionFailure;
use xgpo_wiki::{Category, RenderOptions};

/// Locale-independent identifier for every fixed user-facing string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    Loading,
    Checking,
    Offline,
    Maintenance,
    ConfigUnavailable,
    ConfigInvalid,
    UpdateRequired,
    UpdateDownloadFailed,
    UpdateIntegrityFailed,
    UpdateInstallFailed,
    Relaunching,
    StartupFailed,
    Cancelled,
    NoResults,
    CategoryFailed,
    Source,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Language {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::PtBr => "pt-BR",
            Self::EnUs => "en-US",
        }
    }

    /// Map a POSIX locale such as `en_GB.UTF-8` onto a supported language.
    /// Languages with no translation of their own read English; anything
    /// unrecognised reads Portuguese.
    #[must_use]
    pub fn from_locale(locale: &str) -> Self {
        let primary = locale
            .split(['_', '-', '.', '@'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" | "es" | "fr" | "de" | "it" | "ja" | "ko" => Self::EnUs,
            _ => Self::PtBr,
        }
    }

    pub fn detect() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
            .map_or_else(Self::default, |locale| Self::from_locale(&locale))
    }

    #[must_use]
    pub fn text(self, key: Text) -> &'static str {
        match self {
            Self::PtBr => pt_br(key),
            Self::EnUs => en_us(key),
        }
    }

    #[must_use]
    pub fn failure_message(self, failure: AdmissionFailure) -> &'static str {
        self.text(match failure {
            AdmissionFailure::Offline => Text::Offline,
            AdmissionFailure::Maintenance => Text::Maintenance,
            AdmissionFailure::ConfigUnavailable => Text::ConfigUnavailable,
            AdmissionFailure::ConfigDecode => Text::ConfigInvalid,
            AdmissionFailure::UpdateDownload => Text::UpdateDownloadFailed,
            AdmissionFailure::UpdateIntegrity => Text::UpdateIntegrityFailed,
            AdmissionFailure::UpdateInstall => Text::UpdateInstallFailed,
        })
    }

    #[must_use]
    pub fn category_label(self, category: Category) -> &'static str {
        match (self, category) {
            (_, Category::Boss) => "Bosses",
            (Self::PtBr, Category::Weapon) => "Espadas/Armas",
            (Self::EnUs, Category::Weapon) => "Swords/Weapons",
            (Self::PtBr, Category::Ship) => "Navios",
            (Self::EnUs, Category::Ship) => "Ships",
            (_, Category::Gamepass) => "Gamepasses",
            (_, Category::Merchant) => "Merchants",
            (_, Category::TradeValue) => "Trade Meta",
        }
    }

    #[must_use]
    pub fn render_options(self) -> RenderOptions {
        RenderOptions {
            source_label: self.text(Text::Source).to_string(),
            no_results: self.text(Text::NoResults).to_string(),
            failure: self.text(Text::CategoryFailed).to_string(),
        }
    }
}

fn pt_br(key: Text) -> &'static str {
    match key {
        Text::Loading => "Carregando launcher...",
        Text::Checking => "Checando internet, status e atualizações...",
        Text::Offline => "Sem internet/Wi-Fi. O app exige conexão para abrir.",
        Text::Maintenance => "App em manutenção. Tente novamente mais tarde.",
        Text::ConfigUnavailable => {
            "Não foi possível consultar o status do app. Tente novamente em instantes."
        }
        Text::ConfigInvalid => "Configuração remota inválida. Contate o suporte.",
        Text::UpdateRequired => "Atualização obrigatória encontrada. Atualizando...",
        Text::UpdateDownloadFailed => "Falha ao baixar a atualização. Tente novamente.",
        Text::UpdateIntegrityFailed => {
            "A atualização baixada está corrompida ou foi adulterada e foi descartada."
        }
        Text::UpdateInstallFailed => "Não foi possível instalar a atualização.",
        Text::Relaunching => "Atualização pronta. Reiniciando...",
        Text::StartupFailed => "Não foi possível iniciar o launcher.",
        Text::Cancelled => "Operação cancelada.",
        Text::NoResults => "Nenhum resultado encontrado.",
        Text::CategoryFailed => "Não foi possível carregar esta categoria.",
        Text::Source => "Fonte",
    }
}

fn en_us(key: Text) -> &'static str {
    match key {
        Text::Loading => "Loading launcher...",
        Text::Checking => "Checking internet, status and updates...",
        Text::Offline => "No internet/Wi-Fi. The app requires connection to open.",
        Text::Maintenance => "App is under maintenance. Please try again later.",
        Text::ConfigUnavailable => "Could not reach the app status service. Try again shortly.",
        Text::ConfigInvalid => "Remote configuration is invalid. Please contact support.",
        Text::UpdateRequired => "Mandatory update found. Updating...",
        Text::UpdateDownloadFailed => "Failed to download the update. Please try again.",
        Text::UpdateIntegrityFailed => {
            "The downloaded update was corrupted or tampered with and was discarded."
        }
        Text::UpdateInstallFailed => "The update could not be installed.",
        Text::Relaunching => "Update ready. Restarting...",
        Text::StartupFailed => "The launcher could not start.",
        Text::Cancelled => "Operation cancelled.",
        Text::NoResults => "No results found.",
        Text::CategoryFailed => "This category could not be loaded.",
        Text::Source => "Source",
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language {0:?} (expected pt-BR or en-US)")]
pub struct UnknownLanguage(String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Ok(Self::PtBr),
            "en-us" | "en" => Ok(Self::EnUs),
            _ => Err(UnknownLanguage(value.to_string())),
        }
    }
}
