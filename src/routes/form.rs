use crate::error::{Error, Result};
use crate::services::storage_service::Upload;
use crate::services::support_service::MessageDraft;
use axum::extract::Multipart;
use std::collections::HashMap;

/// Text fields and non-empty file parts of a multipart body, by field name.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, Upload>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }

    /// `message`, `file` and `image` parts as a draft. The image part must
    /// carry an image content type.
    pub fn into_draft(mut self) -> Result<MessageDraft> {
        let image = self.take_file("image");
        if let Some(image) = &image {
            if !image.content_type.starts_with("image/") {
                return Err(Error::BadRequest("The image attachment must be an image".to_string()));
            }
        }
        Ok(MessageDraft {
            message: self.text("message"),
            file: self.take_file("file"),
            image,
        })
    }
}

pub async fn read_form(mut multipart: Multipart) -> Result<FormData> {
    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await.map_err(Error::Multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(Error::Multipart)?;
                // Browsers send an empty part for an untouched file input.
                if body.is_empty() {
                    continue;
                }
                let file_name = if file_name.trim().is_empty() { name.clone() } else { file_name };
                form.files.insert(
                    name,
                    Upload {
                        file_name,
                        content_type,
                        body,
                    },
                );
            }
            None => {
                let value = field.text().await.map_err(Error::Multipart)?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}
