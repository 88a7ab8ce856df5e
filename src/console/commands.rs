use crate::audio::TenantId;

/// Comandos que entiende la consola
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Skip,
    Next,
    Prev,
    Pause,
    Resume,
    Stop,
    Shuffle,
    Loop,
    Clear,
    /// Página 0-based; `None` deja que la sesión elija
    Queue(Option<usize>),
    History(Option<usize>),
    /// Posición 0-based en la cola
    Remove(usize),
    NowPlaying,
    Leave,
    Use(TenantId),
    Sessions,
    Help,
    Quit,
}

/// Una línea ya interpretada: tenant opcional (`@N`) y comando
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tenant: Option<TenantId>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a valid position")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid tenant")]
    InvalidTenant(String),
}

pub const HELP: &str = "\
Comandos:
  play <búsqueda|url>   Agrega a la cola (alias: p)
  skip | next | prev    Salta, salta sin loop, vuelve atrás
  pause | resume | stop Control de reproducción
  shuffle | loop        Mezcla la cola, alterna el loop
  clear                 Vacía la cola sin cortar el track actual
  queue [página]        Muestra la cola (alias: q)
  history [página]      Muestra el historial (alias: h)
  remove <posición>     Quita un track de la cola (alias: rm)
  np                    Track actual
  leave                 Cierra la sesión (alias: dc)
  use <tenant>          Cambia el tenant por defecto
  sessions              Lista las sesiones abiertas
  quit                  Sale
Prefijo opcional: @<tenant> <comando>";

/// Interpreta una línea de la consola
pub fn parse(line: &str) -> Result<Invocation, ParseError> {
    let mut rest = line.trim();
    let mut tenant = None;

    if let Some(stripped) = rest.strip_prefix('@') {
        let (id, tail) = split_word(stripped);
        tenant = Some(parse_tenant(id)?);
        rest = tail;
    }

    let (word, argument) = split_word(rest);
    if word.is_empty() {
        return Err(ParseError::Empty);
    }

    let command = match word.to_lowercase().as_str() {
        "play" | "p" => {
            if argument.is_empty() {
                return Err(ParseError::MissingArgument("play"));
            }
            Command::Play(argument.to_string())
        }
        "skip" | "s" => Command::Skip,
        "next" | "n" => Command::Next,
        "prev" | "back" => Command::Prev,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "shuffle" => Command::Shuffle,
        "loop" => Command::Loop,
        "clear" => Command::Clear,
        "queue" | "q" => Command::Queue(parse_page(argument)?),
        "history" | "h" => Command::History(parse_page(argument)?),
        "remove" | "rm" => {
            if argument.is_empty() {
                return Err(ParseError::MissingArgument("remove"));
            }
            let position = parse_number(argument)?;
            Command::Remove(
                position
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::InvalidNumber(argument.to_string()))?,
            )
        }
        "np" | "nowplaying" => Command::NowPlaying,
        "leave" | "dc" => Command::Leave,
        "use" => {
            if argument.is_empty() {
                return Err(ParseError::MissingArgument("use"));
            }
            Command::Use(parse_tenant(argument)?)
        }
        "sessions" => Command::Sessions,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(Invocation { tenant, command })
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn parse_number(input: &str) -> Result<usize, ParseError> {
    input
        .parse()
        .map_err(|_| ParseError::InvalidNumber(input.to_string()))
}

/// Las páginas se escriben 1-based; 0 o vacío deja el valor por defecto
fn parse_page(input: &str) -> Result<Option<usize>, ParseError> {
    if input.is_empty() {
        return Ok(None);
    }
    Ok(parse_number(input)?.checked_sub(1))
}

fn parse_tenant(input: &str) -> Result<TenantId, ParseError> {
    input
        .parse()
        .map(TenantId)
        .map_err(|_| ParseError::InvalidTenant(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn command(line: &str) -> Command {
        parse(line).unwrap().command
    }

    #[test]
    fn parses_play_with_spaces() {
        assert_eq!(
            parse("play never gonna give you up").unwrap(),
            Invocation {
                tenant: None,
                command: Command::Play("never gonna give you up".to_string()),
            }
        );
        assert_eq!(parse("play"), Err(ParseError::MissingArgument("play")));
    }

    #[test]
    fn tenant_prefix() {
        let invocation = parse("@7 skip").unwrap();
        assert_eq!(invocation.tenant, Some(TenantId(7)));
        assert_eq!(invocation.command, Command::Skip);
        assert_eq!(parse("@x skip"), Err(ParseError::InvalidTenant("x".to_string())));
    }

    #[test]
    fn positions_are_one_based() {
        assert_eq!(command("remove 1"), Command::Remove(0));
        assert_eq!(command("rm 12"), Command::Remove(11));
        assert_eq!(parse("remove 0"), Err(ParseError::InvalidNumber("0".to_string())));
        assert_eq!(parse("remove x"), Err(ParseError::InvalidNumber("x".to_string())));

        assert_eq!(command("queue"), Command::Queue(None));
        assert_eq!(command("q 2"), Command::Queue(Some(1)));
        assert_eq!(command("history 0"), Command::History(None));
    }

    #[test]
    fn aliases_and_errors() {
        assert_eq!(command("NP"), Command::NowPlaying);
        assert_eq!(command("dc"), Command::Leave);
        assert_eq!(command("clear"), Command::Clear);
        assert_eq!(command("use 3"), Command::Use(TenantId(3)));
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("volume 10"), Err(ParseError::Unknown("volume".to_string())));
    }
}
