use log::info;

use crate::error::DispatchError;

pub(crate) trait DispatchChannel {
    fn dispatch(&self, address: &str, message: &str) -> Result<(), DispatchError>;
}

/// Hands the message to WhatsApp through a `wa.me` deep link opened in the browser.
#[derive(Clone, Debug)]
pub(crate) struct WhatsAppLink {
    link_base: String,
}

impl WhatsAppLink {
    pub(crate) fn new(link_base: &str) -> Self {
        Self {
            link_base: link_base.to_string(),
        }
    }

    pub(crate) fn link(&self, address: &str, message: &str) -> String {
        let base = self.link_base.trim_end_matches('/');
        format!("{base}/{address}?text={}", urlencoding::encode(message))
    }
}

impl DispatchChannel for WhatsAppLink {
    fn dispatch(&self, address: &str, message: &str) -> Result<(), DispatchError> {
        let link = self.link(address, message);
        webbrowser::open(&link).map_err(|err| DispatchError::Channel(err.to_string()))?;
        info!("dispatch link opened for {address}");
        Ok(())
    }
}
