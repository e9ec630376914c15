/// The single-page upload UI.
pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Imagetale</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 44rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { margin-bottom: 0.2rem; }
  .hint { color: #666; margin-top: 0; }
  form { display: flex; gap: 0.6rem; align-items: center; margin: 1.5rem 0; }
  #preview { max-width: 100%; max-height: 22rem; border-radius: 6px; display: none; }
  .panel { border: 1px solid #ddd; border-radius: 6px; padding: 0.8rem 1rem; margin: 1rem 0; }
  .panel h2 { font-size: 0.95rem; text-transform: uppercase; color: #777; margin: 0 0 0.4rem; }
  .fallback { color: #a15c00; }
  .error { color: #b00020; }
  #spinner { display: none; width: 1.2rem; height: 1.2rem; border: 3px solid #ccc; border-top-color: #333; border-radius: 50%; animation: spin 0.8s linear infinite; }
  @keyframes spin { to { transform: rotate(360deg); } }
  [hidden] { display: none !important; }
</style>
</head>
<body>
<h1>Imagetale</h1>
<p class="hint">Upload a photo. It gets a caption, a short story, and a voice.</p>

<form id="upload">
  <input type="file" id="image" name="image" accept="image/jpeg" required>
  <button type="submit" id="submit">Tell the story</button>
  <div id="spinner"></div>
</form>

<img id="preview" alt="Uploaded image">
<p id="error" class="error" hidden></p>

<div class="panel" id="caption-panel" hidden>
  <h2>Scenario</h2>
  <p id="caption"></p>
</div>
<div class="panel" id="story-panel" hidden>
  <h2>Story</h2>
  <p id="story"></p>
  <p id="fallback" class="fallback" hidden></p>
</div>
<div class="panel" id="audio-panel" hidden>
  <h2>Audio</h2>
  <audio id="audio" controls></audio>
</div>

<script>
const $ = (id) => document.getElementById(id);

$("image").addEventListener("change", () => {
  const file = $("image").files[0];
  if (!file) return;
  $("preview").src = URL.createObjectURL(file);
  $("preview").style.display = "block";
});

$("upload").addEventListener("submit", async (event) => {
  event.preventDefault();
  const file = $("image").files[0];
  if (!file) return;

  for (const id of ["error", "caption-panel", "story-panel", "audio-panel", "fallback"]) $(id).hidden = true;
  $("spinner").style.display = "inline-block";
  $("submit").disabled = true;

  const form = new FormData();
  form.append("image", file, file.name);

  try {
    const response = await fetch("/api/story", { method: "POST", body: form });
    const body = await response.json();
    if (!response.ok) {
      const err = body.error || {};
      $("error").textContent = `${err.stage || "request"} failed: ${err.message || response.statusText}`;
      $("error").hidden = false;
      return;
    }

    $("caption").textContent = body.caption;
    $("caption-panel").hidden = false;

    $("story").textContent = body.story;
    if (body.story_fallback) {
      $("fallback").textContent = `Story generation failed: ${body.fallback_reason}`;
      $("fallback").hidden = false;
    }
    $("story-panel").hidden = false;

    $("audio").src = body.audio.data_url;
    $("audio-panel").hidden = false;
  } catch (e) {
    $("error").textContent = `Request failed: ${e}`;
    $("error").hidden = false;
  } finally {
    $("spinner").style.display = "none";
    $("submit").disabled = false;
  }
});
</script>
</body>
</html>
"#;
