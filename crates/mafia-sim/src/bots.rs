//! Random voters that play the game from the signal stream.

use std::sync::Arc;

use mafia_core::{
  player::{Player, PlayerId},
  role::RoleKind,
  state::State,
  storage::GameStorage,
  vote::{OneVote, PlayerRef, TwoVote},
};
use mafia_engine::{Game, SignalKind};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};

/// Targets a bot may pick: living players other than itself that it did not
/// choose within the last `vote_ping` nights.
pub fn candidates(
  voter: &Player,
  living: &[Player],
  vote_ping: usize,
) -> Vec<PlayerId> {
  let recent: Vec<PlayerId> = voter.recent_targets(vote_ping).collect();
  living
    .iter()
    .filter(|p| p.id != voter.id && !recent.contains(&p.id))
    .map(|p| p.id)
    .collect()
}

/// Choose `count` distinct targets, or nothing if there are too few
/// candidates.
pub fn pick<R: Rng + ?Sized>(
  candidates: &[PlayerId],
  count: usize,
  rng: &mut R,
) -> Option<Vec<PlayerId>> {
  (candidates.len() >= count)
    .then(|| candidates.choose_multiple(rng, count).copied().collect())
}

/// Drive every player of `game` with random choices until the game ends.
pub fn spawn<S: GameStorage + 'static>(game: Arc<Game<S>>) -> JoinHandle<()> {
  let mut signals = game.subscribe();
  tokio::spawn(async move {
    let mut rng = StdRng::from_entropy();
    loop {
      let signal = match signals.recv().await {
        Ok(signal) => signal,
        Err(RecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "bots fell behind the signal stream");
          continue;
        }
        Err(RecvError::Closed) => break,
      };
      match signal.kind {
        SignalKind::SwitchVotingRole { role: Some(role) } => {
          night_turn(&game, role, &mut rng).await;
        }
        SignalKind::SwitchState { new: State::Day, .. } => {
          day_turn(&game, &mut rng).await;
        }
        SignalKind::Error(error) => tracing::warn!(%error, "game error"),
        SignalKind::Fatal(error) => tracing::error!(%error, "game failed"),
        _ => {}
      }
    }
  })
}

async fn night_turn<S: GameStorage>(
  game: &Game<S>,
  role: RoleKind,
  rng: &mut StdRng,
) {
  let living = living(game).await;
  let Some(voter) = living
    .iter()
    .filter(|p| p.role == role && !p.is_muted())
    .collect::<Vec<_>>()
    .choose(rng)
    .copied()
  else {
    return;
  };

  let voter_ref = PlayerRef::in_game(voter.id);
  let options = candidates(voter, &living, game.vote_ping());
  let targets = pick(&options, role.votes_per_night(), rng);

  let result = match targets.as_deref() {
    Some(&[first, second]) => {
      let pair = (PlayerRef::in_game(first), PlayerRef::in_game(second));
      game.set_night_two_vote(TwoVote::new(voter_ref, Some(pair))).await
    }
    Some(&[target]) => {
      game
        .set_night_vote(OneVote::new(voter_ref, Some(PlayerRef::in_game(target))))
        .await
    }
    _ if role.is_two_votes() => {
      game.set_night_two_vote(TwoVote::new(voter_ref, None)).await
    }
    _ => game.set_night_vote(OneVote::empty(voter_ref)).await,
  };

  if let Err(error) = result {
    tracing::debug!(%role, voter = %voter.id, %error, "bot vote rejected");
  }
}

async fn day_turn<S: GameStorage>(game: &Game<S>, rng: &mut StdRng) {
  let living = living(game).await;
  for voter in &living {
    // Some players abstain.
    if rng.gen_bool(0.2) {
      continue;
    }
    let options: Vec<PlayerId> = living
      .iter()
      .filter(|p| p.id != voter.id)
      .map(|p| p.id)
      .collect();
    let Some(&target) = options.choose(rng) else {
      continue;
    };
    let vote = OneVote::new(
      PlayerRef::in_game(voter.id),
      Some(PlayerRef::in_game(target)),
    );
    if let Err(error) = game.set_day_vote(vote).await {
      tracing::debug!(voter = %voter.id, %error, "bot day vote rejected");
    }
  }
}

async fn living<S: GameStorage>(game: &Game<S>) -> Vec<Player> {
  game
    .active_players()
    .await
    .into_iter()
    .filter(Player::is_alive)
    .collect()
}
