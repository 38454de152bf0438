//! Server side of the control protocol.
//!
//! Wraps any `EngineClient` and answers protocol requests read line by line,
//! so an engine can be placed behind a process boundary.

use serde::Serialize;
use std::io::{self, BufRead, Write};

use crate::{EngineClient, EngineRequest, EngineResponse};

/// Serves protocol requests against a wrapped engine
pub struct EngineHost<E> {
    engine: E,
}

impl<E: EngineClient> EngineHost<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    #[cfg(test)]
    fn engine(&self) -> &E {
        &self.engine
    }

    /// Handle one request. Returns `None` for `Quit`.
    pub fn handle(&mut self, request: EngineRequest) -> Option<EngineResponse> {
        let result = match request {
            EngineRequest::RegisterDefinition { definition } => self
                .engine
                .register_definition(&definition)
                .map(|()| EngineResponse::Registered {
                    definition: definition.id,
                }),
            EngineRequest::Instantiate {
                definition,
                parameters,
            } => self
                .engine
                .instantiate(&definition, &parameters)
                .map(|instance| EngineResponse::Instantiated { instance }),
            EngineRequest::UpdateParameter {
                instance,
                name,
                value,
            } => self
                .engine
                .update_parameter(instance, &name, value)
                .map(|()| EngineResponse::Updated),
            EngineRequest::Release { instance } => self
                .engine
                .release(instance)
                .map(|()| EngineResponse::Released),
            EngineRequest::QueryInstances => self
                .engine
                .instances()
                .map(|instances| EngineResponse::Instances { instances }),
            EngineRequest::Quit => return None,
        };

        Some(result.unwrap_or_else(|e| EngineResponse::Error {
            message: e.message().to_string(),
        }))
    }

    /// Connect the engine, announce `Ready`, and answer requests until
    /// `Quit` or end of input. The engine is disconnected on return.
    pub fn serve<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> io::Result<()> {
        if let Err(e) = self.engine.connect() {
            tracing::error!("Engine failed to start: {}", e);
            return write_message(
                &mut writer,
                &EngineResponse::Error {
                    message: e.to_string(),
                },
            );
        }

        write_message(
            &mut writer,
            &EngineResponse::Ready {
                engine: self.engine.name().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )?;
        tracing::info!("Engine host ready ({})", self.engine.name());

        let result = self.serve_requests(reader, &mut writer);
        self.engine.disconnect();
        tracing::info!("Engine host stopped");
        result
    }

    fn serve_requests<R: BufRead, W: Write>(&mut self, reader: R, writer: &mut W) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: EngineRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    // Still answer, so responses stay paired with requests
                    write_message(
                        writer,
                        &EngineResponse::Error {
                            message: format!("Failed to parse request: {e}"),
                        },
                    )?;
                    continue;
                }
            };

            tracing::debug!("Request: {}", request.label());
            match self.handle(request) {
                Some(response) => write_message(writer, &response)?,
                None => break,
            }
        }
        Ok(())
    }
}

fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let json = serde_json::to_string(message).map_err(io::Error::other)?;
    writeln!(writer, "{json}")?;
    writer.flush()
}
