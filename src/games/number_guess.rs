//! Number guessing game
//!
//! The widget runs entirely in the browser: it picks a secret between
//! `MIN` and `MAX`, answers each guess with a hint and counts attempts.

use crate::db::NUMBER_GUESS_PATH;
use crate::registry::GameUnit;

pub struct NumberGuess {
    min: u32,
    max: u32,
}

impl NumberGuess {
    pub const KEY: &'static str = NUMBER_GUESS_PATH;
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    pub fn new() -> Self {
        Self {
            min: Self::MIN,
            max: Self::MAX,
        }
    }
}

impl Default for NumberGuess {
    fn default() -> Self {
        Self::new()
    }
}

impl GameUnit for NumberGuess {
    fn name(&self) -> &'static str {
        "number-guess"
    }

    fn render(&self) -> String {
        NUMBER_GUESS_HTML
            .replace("{{MIN}}", &self.min.to_string())
            .replace("{{MAX}}", &self.max.to_string())
    }
}

const NUMBER_GUESS_HTML: &str = r##"<div class="number-guess" id="number-guess" data-min="{{MIN}}" data-max="{{MAX}}">
    <h2>Guess the Number!</h2>
    <p class="number-guess-intro">I'm thinking of a number between {{MIN}} and {{MAX}}.</p>
    <form class="number-guess-form" id="number-guess-form" autocomplete="off">
        <input type="number" id="number-guess-input" min="{{MIN}}" max="{{MAX}}" required>
        <button type="submit" class="btn btn-primary">Guess</button>
    </form>
    <p class="number-guess-feedback" id="number-guess-feedback" aria-live="polite"></p>
    <p class="number-guess-attempts">Attempts: <span id="number-guess-attempts">0</span></p>
    <button type="button" class="btn btn-secondary" id="number-guess-reset" hidden>Play Again</button>
</div>
<script>
(function () {
    var root = document.getElementById('number-guess');
    var min = parseInt(root.dataset.min, 10);
    var max = parseInt(root.dataset.max, 10);
    var form = document.getElementById('number-guess-form');
    var input = document.getElementById('number-guess-input');
    var feedback = document.getElementById('number-guess-feedback');
    var attemptsEl = document.getElementById('number-guess-attempts');
    var reset = document.getElementById('number-guess-reset');
    var secret, attempts;

    function start() {
        secret = Math.floor(Math.random() * (max - min + 1)) + min;
        attempts = 0;
        attemptsEl.textContent = '0';
        feedback.textContent = '';
        input.value = '';
        input.disabled = false;
        reset.hidden = true;
        input.focus();
    }

    form.addEventListener('submit', function (event) {
        event.preventDefault();
        var guess = parseInt(input.value, 10);
        if (isNaN(guess) || guess < min || guess > max) {
            feedback.textContent = 'Please enter a number between ' + min + ' and ' + max + '.';
            return;
        }
        attempts += 1;
        attemptsEl.textContent = String(attempts);
        if (guess < secret) {
            feedback.textContent = 'Too low! Try a bigger number. ⬆️';
        } else if (guess > secret) {
            feedback.textContent = 'Too high! Try a smaller number. ⬇️';
        } else {
            feedback.textContent = 'You got it! The number was ' + secret + '. 🎉';
            input.disabled = true;
            reset.hidden = false;
        }
        input.select();
    });

    reset.addEventListener('click', start);
    start();
})();
</script>
"##;
