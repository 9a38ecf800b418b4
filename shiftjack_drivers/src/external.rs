use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::time::Instant;

use shiftjack::simulation::card_source::{CardOracle, DrawRequest};
use shiftjack::CardSourceError;
use tracing::{event, Level};

/// Asks an external program which card to deal.
///
/// Every draw spawns `command` with `args`, writes the request as one line of JSON to its stdin
/// and takes whatever it prints on stdout as the answer. The answer is free text; the caller
/// picks the card out of it.
#[derive(Debug, Clone)]
pub struct ExternalCommandOracle {
    command: String,
    args: Vec<String>,
    invocations: u64,
}

impl ExternalCommandOracle {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self {
            command,
            args,
            invocations: 0,
        }
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    fn invoke(&self, request: &DrawRequest<'_>) -> Result<String, CardSourceError> {
        let mut payload =
            serde_json::to_vec(request).map_err(|err| delegate_error("encode request", err))?;
        payload.push(b'\n');

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| delegate_error("spawn", err))?;

        // An oracle may answer without reading its request and close stdin early.
        let written = match child.stdin.take() {
            Some(mut stdin) => match stdin.write_all(&payload) {
                Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other.map_err(|err| delegate_error("write request", err)),
            },
            None => Err(CardSourceError::Delegate(String::from("stdin unavailable"))),
        };
        if let Err(err) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }

        let output = child
            .wait_with_output()
            .map_err(|err| delegate_error("wait", err))?;
        if !output.status.success() {
            return Err(CardSourceError::Delegate(format!(
                "{} exited with {}",
                self.command, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn delegate_error(action: &str, err: impl std::fmt::Display) -> CardSourceError {
    CardSourceError::Delegate(format!("{}: {}", action, err))
}

impl CardOracle for ExternalCommandOracle {
    fn propose(&mut self, request: &DrawRequest<'_>) -> Result<String, CardSourceError> {
        self.invocations += 1;
        let start = Instant::now();
        let answer = self.invoke(request)?;
        event!(
            target: "shiftjack_drivers::external",
            Level::TRACE,
            command = %self.command,
            role = ?request.role,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            answer = %answer,
            "external oracle answered"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shiftjack::simulation::card_source::{
        CardSource, DelegatedCardSource, FallbackPolicy, RetryPolicy,
    };
    use shiftjack::Card;

    fn shell(script: &str) -> ExternalCommandOracle {
        ExternalCommandOracle::new(
            String::from("sh"),
            vec![String::from("-c"), String::from(script)],
        )
    }

    #[test]
    fn reads_answer_from_stdout() {
        let mut oracle = shell("cat > /dev/null; echo 'I will deal the Queen of hearts'");
        let answer = oracle.propose(&DrawRequest::setup(&[], &[])).unwrap();
        assert_eq!(answer, "I will deal the Queen of hearts");
        assert_eq!(Card::find_in_text(&answer), Some(Card::Queen));
        assert_eq!(oracle.invocations(), 1);
    }

    #[test]
    fn request_reaches_the_process() {
        let mut oracle = shell(r#"if grep -q '"role":"Dealer"'; then echo King; else echo Two; fi"#);
        let dealer = [Card::Ten, Card::Five];
        let answer = oracle
            .propose(&DrawRequest::dealer(&[Card::Nine], &dealer, 15))
            .unwrap();
        assert_eq!(answer, "King");

        let answer = oracle.propose(&DrawRequest::setup(&[], &[])).unwrap();
        assert_eq!(answer, "Two");
    }

    #[test]
    fn oracle_that_ignores_its_request_still_answers() {
        let mut oracle = shell("echo King");
        let dealer = [Card::Ten, Card::Six];
        for _ in 0..100 {
            let answer = oracle
                .propose(&DrawRequest::dealer(&[Card::Nine, Card::Eight], &dealer, 16))
                .unwrap();
            assert_eq!(answer, "King");
        }
        assert_eq!(oracle.invocations(), 100);
    }

    #[test]
    fn failures_become_delegate_errors() {
        let mut oracle = shell("cat > /dev/null; exit 3");
        assert!(matches!(
            oracle.propose(&DrawRequest::setup(&[], &[])),
            Err(CardSourceError::Delegate(_))
        ));

        let mut missing = ExternalCommandOracle::new(String::from("/no/such/oracle"), Vec::new());
        assert!(matches!(
            missing.propose(&DrawRequest::setup(&[], &[])),
            Err(CardSourceError::Delegate(_))
        ));
    }

    #[test]
    fn delegated_source_falls_back_on_nonsense() {
        let oracle = shell("cat > /dev/null; echo 'no idea'");
        let policy = RetryPolicy {
            max_attempts: 2,
            fallback: FallbackPolicy::UniformRandom,
        };
        let mut source = DelegatedCardSource::new(oracle, policy, StdRng::seed_from_u64(5));
        source.draw(&DrawRequest::setup(&[], &[])).unwrap();
        assert_eq!(source.fallbacks(), 1);
        assert_eq!(source.oracle().invocations(), 2);
    }
}
